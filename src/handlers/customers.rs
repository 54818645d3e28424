//! Customer profile pages, backed by the table store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, Redirect};
use axum::Form;
use serde::Deserialize;
use tera::Context;

use super::page;
use crate::errors::AppError;
use crate::models::{normalize_tier, CustomerProfile};
use crate::AppState;

/// Tiers offered by the forms.  Any other stored value is still shown.
pub const LOYALTY_TIERS: &[&str] = &["Bronze", "Silver", "Gold", "Platinum"];

/// Create and edit form body.  Missing fields read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerForm {
    pub full_name: String,
    pub email: String,
    pub favorite_product: String,
    pub loyalty_tier: String,
}

fn tier_options(current: Option<&str>) -> Vec<String> {
    let mut tiers: Vec<String> = LOYALTY_TIERS.iter().map(|t| t.to_string()).collect();
    if let Some(current) = current {
        if !current.is_empty() && !tiers.iter().any(|t| t == current) {
            tiers.push(current.to_string());
        }
    }
    tiers
}

/// `GET /customers`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let customers = state.storage.list_customers().await?;
    let mut context = Context::new();
    context.insert("customers", &customers);
    context.insert("tiers", &tier_options(None));
    page("customers.html", &context)
}

/// `POST /customers`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CustomerForm>,
) -> Result<Redirect, AppError> {
    let profile = CustomerProfile::new(
        &form.full_name,
        &form.email,
        &form.favorite_product,
        &form.loyalty_tier,
    );
    state.storage.add_customer(profile).await?;
    Ok(Redirect::to("/customers"))
}

/// `GET /customers/:row_key/edit`
pub async fn edit_page(
    State(state): State<Arc<AppState>>,
    Path(row_key): Path<String>,
) -> Result<Html<String>, AppError> {
    if row_key.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    let customer = state
        .storage
        .get_customer(&row_key)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut context = Context::new();
    context.insert("tiers", &tier_options(Some(&customer.loyalty_tier)));
    context.insert("customer", &customer);
    page("customer_edit.html", &context)
}

/// `POST /customers/:row_key/edit` -- replaces the four fields of an
/// existing profile.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(row_key): Path<String>,
    Form(form): Form<CustomerForm>,
) -> Result<Redirect, AppError> {
    if row_key.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    let mut customer = state
        .storage
        .get_customer(&row_key)
        .await?
        .ok_or(AppError::NotFound)?;
    customer.full_name = form.full_name;
    customer.email = form.email;
    customer.favorite_product = form.favorite_product;
    customer.loyalty_tier = normalize_tier(&form.loyalty_tier);
    state.storage.update_customer(customer).await?;
    Ok(Redirect::to("/customers"))
}

/// `POST /customers/:row_key/delete`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(row_key): Path<String>,
) -> Result<Redirect, AppError> {
    if !row_key.trim().is_empty() {
        state.storage.delete_customer(&row_key).await?;
    }
    Ok(Redirect::to("/customers"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_options_keep_unknown_current_tier() {
        assert_eq!(tier_options(None).len(), 4);
        assert_eq!(tier_options(Some("Gold")).len(), 4);
        let tiers = tier_options(Some("Diamond"));
        assert_eq!(tiers.last().map(String::as_str), Some("Diamond"));
        assert_eq!(tier_options(Some("")).len(), 4);
    }
}
