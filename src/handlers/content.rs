use crate::{
    error::ServerError,
    handlers::SERVER_NAME,
    models::{TierContent, VerifiedPayment},
};
use axum::{http::Uri, Extension, Json};

struct TierPage {
    name: &'static str,
    title: &'static str,
    message: &'static str,
    features: &'static [&'static str],
    next_upgrade: Option<&'static str>,
}

const PAGES: [TierPage; 4] = [
    TierPage {
        name: "basic",
        title: "Basic",
        message: "Welcome to the basic tier!",
        features: &["Basic content access", "Standard support", "Community features"],
        next_upgrade: Some("Premium tier for $0.01"),
    },
    TierPage {
        name: "premium",
        title: "Premium",
        message: "Welcome to the premium tier!",
        features: &[
            "Premium content access",
            "Priority support",
            "Advanced features",
            "Exclusive content",
        ],
        next_upgrade: Some("Pro tier for $0.10"),
    },
    TierPage {
        name: "pro",
        title: "Pro",
        message: "Welcome to the pro tier!",
        features: &[
            "Pro content access",
            "24/7 support",
            "All advanced features",
            "Exclusive pro content",
            "API access",
        ],
        next_upgrade: Some("VIP tier for $1.00"),
    },
    TierPage {
        name: "vip",
        title: "VIP",
        message: "You have reached the highest tier!",
        features: &[
            "VIP content access",
            "Personal manager",
            "All features unlocked",
            "Exclusive VIP content",
            "Full API access",
            "Custom integrations",
            "White-label options",
        ],
        next_upgrade: None,
    },
];

pub async fn tier_content(
    uri: Uri,
    payment: Option<Extension<VerifiedPayment>>,
) -> Result<Json<TierContent>, ServerError> {
    let page = uri
        .path()
        .strip_prefix("/api/")
        .and_then(|tier| PAGES.iter().find(|page| page.name == tier))
        .ok_or(ServerError::NotFound)?;

    // The gate attaches a payment to every request on a priced route.
    let Some(Extension(payment)) = payment else {
        return Err(ServerError::Internal(format!(
            "no verified payment for /api/{}",
            page.name
        )));
    };

    Ok(Json(TierContent {
        content: format!("{} {} Content", page.title, SERVER_NAME),
        message: page.message.to_string(),
        features: page.features.iter().map(|f| f.to_string()).collect(),
        next_upgrade: page.next_upgrade.map(str::to_string),
        payment: format!("Verified with {} verification", payment.verifier),
        payer: payment.payer,
        amount: payment.amount,
    }))
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
