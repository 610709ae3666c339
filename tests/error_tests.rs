// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use challenge_tracker::error::{AppError, ErrorKind, StoreError};

#[test]
fn test_store_error_kinds() {
    assert_eq!(StoreError::NotFound("x".into()).kind(), ErrorKind::NotFound);
    assert_eq!(StoreError::Decode("x".into()).kind(), ErrorKind::Invalid);
    assert_eq!(
        StoreError::AlreadyExists("x".into()).context("users.create").kind(),
        ErrorKind::AlreadyExists
    );
}

#[test]
fn test_context_is_prefixed() {
    let err = StoreError::Unknown("boom".into()).context("challenges.delete c1");
    assert_eq!(err.to_string(), "unknown store error: challenges.delete c1: boom");
}

#[test]
fn test_status_codes() {
    let cases = [
        (StoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
        (StoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        (StoreError::AlreadyExists("x".into()), StatusCode::CONFLICT),
        (StoreError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
        (StoreError::Invalid("x".into()), StatusCode::BAD_REQUEST),
        (StoreError::Unknown("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(AppError::from(err).into_response().status(), status);
    }
}

#[test]
fn test_concealed_hides_forbidden_only() {
    let hidden = AppError::concealed(StoreError::Forbidden("users.read u2".into()));
    assert_eq!(hidden.into_response().status(), StatusCode::NOT_FOUND);

    let conflict = AppError::concealed(StoreError::AlreadyExists("users.create u1".into()));
    assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);
}
