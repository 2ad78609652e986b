use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            UpdateProfileRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{
            hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LEN,
        },
        repo::EmailTaken,
        repo_types::User,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation("Password too short"));
    }

    // Ensure email is not taken
    match state.users.find_by_email(&payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(AppError::Persist(e));
        }
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal(e)
    })?;

    let user = state
        .users
        .create(&payload.email, &hash, name)
        .await
        .map_err(create_failed)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

/// A concurrent registration can still win the unique constraint after our lookup.
fn create_failed(e: anyhow::Error) -> AppError {
    if e.is::<EmailTaken>() {
        warn!("email registered concurrently");
        AppError::Conflict("Email already registered".into())
    } else {
        error!(error = %e, "create user failed");
        AppError::Persist(e)
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(AppError::Persist(e));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        AppError::Internal(e)
    })?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(AppError::Persist)?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(AppError::Persist)?
        .ok_or_else(|| {
            error!(user_id = %user_id, "user not found");
            AppError::NotFound("User")
        })?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    let user = state
        .users
        .update_name(user_id, name)
        .await
        .map_err(AppError::Persist)?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::create_failed;
    use crate::{app::build_app, auth::repo::UserRepo, error::AppError, testing::Harness};

    async fn call(h: &Harness, req: Request<Body>) -> (axum::http::StatusCode, Value) {
        let res = build_app(h.state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn losing_a_registration_race_is_a_conflict() {
        let h = Harness::new();
        h.users.create("ada@example.com", "hash", "Ada").await.unwrap();
        let err = h
            .users
            .create("ada@example.com", "hash", "Ada again")
            .await
            .unwrap_err();
        assert!(matches!(create_failed(err), AppError::Conflict(_)));
        assert!(matches!(
            create_failed(anyhow::anyhow!("connection reset")),
            AppError::Persist(_)
        ));
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let h = Harness::new();
        let (status, json) = call(
            &h,
            post_json(
                "/api/auth/register",
                json!({"email": " Ada@Example.com ", "password": "secret1", "name": " Ada "}),
            ),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::CREATED);
        assert_eq!(json["user"]["email"], "ada@example.com");
        assert_eq!(json["user"]["name"], "Ada");
        assert!(json.get("password_hash").is_none());

        let (status, json) = call(
            &h,
            post_json(
                "/api/auth/login",
                json!({"email": "ADA@example.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::OK);
        let access = json["accessToken"].as_str().unwrap().to_string();
        let refresh = json["refreshToken"].as_str().unwrap().to_string();

        let (status, json) = call(
            &h,
            Request::get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(json["name"], "Ada");

        // refresh tokens are not accepted as access tokens
        let (status, _) = call(
            &h,
            Request::get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);

        let (status, json) = call(
            &h,
            post_json("/api/auth/refresh", json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(json["accessToken"].as_str().is_some());
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let h = Harness::new();
        h.user("taken@example.com", "Taken").await;

        let (status, json) = call(
            &h,
            post_json(
                "/api/auth/register",
                json!({"email": "TAKEN@example.com", "password": "secret1", "name": "x"}),
            ),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::CONFLICT);
        assert_eq!(json["message"], "Email already registered");

        let (status, _) = call(
            &h,
            post_json(
                "/api/auth/register",
                json!({"email": "new@example.com", "password": "123", "name": "x"}),
            ),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &h,
            post_json(
                "/api/auth/login",
                json!({"email": "taken@example.com", "password": "wrong-password"}),
            ),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_me_changes_display_name() {
        let h = Harness::new();
        let (_, token) = h.user("ada@example.com", "Ada").await;
        let (status, json) = call(
            &h,
            Request::patch("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "Countess"}).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(json["name"], "Countess");
    }
}
