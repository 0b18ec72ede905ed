mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, dec_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn valid_cart_is_re_priced_from_the_catalog() {
    let app = TestApp::new().await;
    let artwork = app
        .seed_artwork("Blue Composition", "blue-composition", dec!(100.00), 3, true)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [{
                    "artwork_id": artwork.id,
                    "title": "Blue Composition",
                    "unit_price": "100.00",
                    "quantity": 2,
                    "slug": "blue-composition",
                }]
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(true));
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    assert_eq!(dec_field(&body, "subtotal"), dec!(200.00));
    assert_eq!(dec_field(&body, "shipping_cost"), dec!(5.00));
    assert_eq!(dec_field(&body, "tax_amount"), dec!(0));
    assert_eq!(dec_field(&body, "total"), dec!(205.00));
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(dec_field(&body["items"][0], "line_subtotal"), dec!(200.00));
}

#[tokio::test]
async fn tampered_price_fails_validation_with_200() {
    let app = TestApp::new().await;
    let artwork = app
        .seed_artwork("Red Study", "red-study", dec!(250.00), 1, true)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [{
                    "artwork_id": artwork.id,
                    "title": "Red Study",
                    "unit_price": "1.00",
                    "quantity": 1,
                    "slug": "red-study",
                }]
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(false));
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .as_str()
        .unwrap()
        .contains("The price of \"Red Study\" has changed"));
    // The tampered line is excluded from the totals entirely.
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(dec_field(&body, "subtotal"), dec!(0));
}

#[tokio::test]
async fn equivalent_decimal_representations_are_the_same_price() {
    let app = TestApp::new().await;
    let artwork = app
        .seed_artwork("Grey Field", "grey-field", dec!(50.00), 2, true)
        .await;

    // "50.0" and "50.00" are numerically equal; string comparison would
    // wrongly flag a price change.
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [{
                    "artwork_id": artwork.id,
                    "title": "Grey Field",
                    "unit_price": "50.0",
                    "quantity": 1,
                    "slug": "grey-field",
                }]
            })),
        )
        .await;

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(true));
}

#[tokio::test]
async fn missing_and_unpublished_artworks_are_reported_as_unavailable() {
    let app = TestApp::new().await;
    let hidden = app
        .seed_artwork("Hidden Work", "hidden-work", dec!(75.00), 5, false)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [
                    {
                        "artwork_id": uuid::Uuid::new_v4(),
                        "title": "Deleted Work",
                        "unit_price": "10.00",
                        "quantity": 1,
                        "slug": "deleted-work",
                    },
                    {
                        "artwork_id": hidden.id,
                        "title": "Hidden Work",
                        "unit_price": "75.00",
                        "quantity": 1,
                        "slug": "hidden-work",
                    }
                ]
            })),
        )
        .await;

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(false));
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().contains("\"Deleted Work\" is no longer available"));
    assert!(errors[1].as_str().unwrap().contains("\"Hidden Work\" is no longer available"));
}

#[tokio::test]
async fn over_inventory_and_non_positive_quantities_are_rejected() {
    let app = TestApp::new().await;
    let scarce = app
        .seed_artwork("Last Print", "last-print", dec!(40.00), 1, true)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [
                    {
                        "artwork_id": scarce.id,
                        "title": "Last Print",
                        "unit_price": "40.00",
                        "quantity": 3,
                        "slug": "last-print",
                    },
                    {
                        "artwork_id": scarce.id,
                        "title": "Last Print",
                        "unit_price": "40.00",
                        "quantity": 0,
                        "slug": "last-print",
                    }
                ]
            })),
        )
        .await;

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(false));
    let errors = body["errors"].as_array().unwrap();
    assert!(errors[0].as_str().unwrap().contains("Only 1 of \"Last Print\" available"));
    assert!(errors[1].as_str().unwrap().contains("Invalid quantity for \"Last Print\""));
}

#[tokio::test]
async fn empty_cart_is_invalid_without_touching_the_catalog() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({ "items": [] })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_valid"], json!(false));
    assert_eq!(body["errors"], json!(["Cart is empty"]));
    assert_eq!(dec_field(&body, "total"), dec!(0));
}

#[tokio::test]
async fn mixed_cart_reports_every_failing_line() {
    let app = TestApp::new().await;
    let good = app
        .seed_artwork("Good Work", "good-work", dec!(60.00), 4, true)
        .await;
    let repriced = app
        .seed_artwork("Repriced Work", "repriced-work", dec!(90.00), 4, true)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/cart/validate",
            Some(json!({
                "items": [
                    {
                        "artwork_id": good.id,
                        "title": "Good Work",
                        "unit_price": "60.00",
                        "quantity": 1,
                        "slug": "good-work",
                    },
                    {
                        "artwork_id": repriced.id,
                        "title": "Repriced Work",
                        "unit_price": "80.00",
                        "quantity": 1,
                        "slug": "repriced-work",
                    }
                ]
            })),
        )
        .await;

    let body = body_json(response).await;
    // The surviving line is still priced, but the cart as a whole fails.
    assert_eq!(body["is_valid"], json!(false));
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(dec_field(&body, "subtotal"), dec!(60.00));
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}
