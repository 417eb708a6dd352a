use tracing::info;
use voyage_core::repository::{PlanRepository, UserRepository};
use voyage_core::{NewPlan, Plan, RepoResult, RepositoryError, Role, User, VendorInfo};

pub const CATALOG_VENDOR_EMAIL: &str = "catalog@voyage.local";

struct SamplePlan {
    name: &'static str,
    image: &'static str,
    route: &'static [&'static str],
    description: &'static str,
    price: f64,
}

const SAMPLE_PLANS: &[SamplePlan] = &[
    SamplePlan {
        name: "Golden Triangle Tour",
        image: "https://images.unsplash.com/photo-1524492412937-b28074a5d7da?w=500",
        route: &["Delhi", "Agra", "Jaipur", "Delhi"],
        description: "Delhi's historic monuments, the Taj Mahal at Agra and the royal palaces of Jaipur",
        price: 45000.0,
    },
    SamplePlan {
        name: "Kerala Backwaters Journey",
        image: "https://images.unsplash.com/photo-1602216056096-3b40cc0c9944?w=500",
        route: &["Kochi", "Munnar", "Thekkady", "Alleppey", "Kochi"],
        description: "Houseboat stays on the backwaters with a detour through the Munnar tea estates",
        price: 38000.0,
    },
    SamplePlan {
        name: "Himalayan Adventure",
        image: "https://images.unsplash.com/photo-1626621341517-bbf3d9990a23?w=500",
        route: &["Manali", "Rohtang Pass", "Leh", "Nubra Valley", "Pangong Lake"],
        description: "Mountain trekking from Manali over Rohtang Pass into Ladakh",
        price: 65000.0,
    },
];

/// Provision the verified catalog vendor and give it the sample plans.
/// Returns how many plans were inserted; a second run inserts none.
pub async fn seed_sample_plans(
    users: &dyn UserRepository,
    plans: &dyn PlanRepository,
) -> RepoResult<usize> {
    let vendor = match users.find_by_email(CATALOG_VENDOR_EMAIL).await? {
        Some(vendor) => vendor,
        None => {
            let mut vendor = User::new(CATALOG_VENDOR_EMAIL, "Voyage Catalog", Role::Vendor)
                .with_vendor_info(VendorInfo {
                    organization_name: "Voyage Catalog".to_string(),
                    ..Default::default()
                });
            vendor.vendor_verified = true;
            match users.create(&vendor).await {
                Ok(()) => vendor,
                // Another instance got there first.
                Err(RepositoryError::Conflict(_)) => {
                    return Ok(0);
                }
                Err(e) => return Err(e),
            }
        }
    };

    if !plans.list_by_vendor(vendor.user_id).await?.is_empty() {
        return Ok(0);
    }

    for sample in SAMPLE_PLANS {
        let plan = Plan::new(
            vendor.user_id,
            NewPlan {
                name: sample.name.to_string(),
                image: sample.image.to_string(),
                route: sample.route.iter().map(|s| s.to_string()).collect(),
                description: sample.description.to_string(),
                price: sample.price,
            },
        );
        plans.create(&plan).await?;
        info!("Added sample plan: {}", plan.name);
    }
    Ok(SAMPLE_PLANS.len())
}
