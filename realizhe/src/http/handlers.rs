use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, error, info, warn};

use crate::backend::BackendError;
use crate::cart::{Cart, CartSummary};
use crate::catalog::{
    available_categories, group_by_category, map_products, normalize_category, Product,
};
use crate::customers::{
    register_customer, update_customer, ProfileUpdate, RetryPolicy, SignupRequest,
};
use crate::legal::{TermsSnapshot, PRIVACY_TEXT};
use crate::orders::{
    list_my_orders, submit_custom_plan, submit_order, CustomPlanRequest, OrderRequest,
};

use super::auth::{
    bearer_token, cart_cookie, client_ip, current_session, removal_cookie, require_session,
    session_cookie, CART_COOKIE, SESSION_COOKIE,
};
use super::catalog_page::render_catalog_page;
use super::error::ApiError;
use super::responses::{
    CartResponse, CatalogQuery, CatalogResponse, ClienteResponse, HealthResponse, LegalResponse,
    LoginRequest, LoginResponse, MyOrdersResponse, ProductsQuery, ProductsResponse,
    SessionResponse, SubmissionResponse, SuccessResponse,
};
use super::state::{AppState, Session};

/// Custom plans carry their attachment inline as base64.
const CUSTOM_PLAN_BODY_LIMIT: usize = 15 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/api/produtos", get(list_products))
        .route("/api/catalogo", get(catalog_json))
        .route("/catalogo", get(catalog_page))
        .route("/api/termos", get(terms))
        .route("/api/privacidade", get(privacy))
        .route("/api/cart", get(cart_show).delete(cart_clear))
        .route("/api/cart/items/{id}", post(cart_add).delete(cart_remove))
        .route("/api/cart/items/{id}/decrease", post(cart_decrease))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
        .route("/api/cliente/update", post(update_profile))
        .route("/api/pedidos/me", get(my_orders))
        .route("/api/orders", post(create_order))
        .route(
            "/api/personalizados",
            post(create_custom_plan).layer(DefaultBodyLimit::max(CUSTOM_PLAN_BODY_LIMIT)),
        );

    let routes = match GovernorConfigBuilder::default()
        .per_second(20)
        .burst_size(50)
        .key_extractor(GlobalKeyExtractor)
        .finish()
    {
        Some(governor_conf) => routes.layer(GovernorLayer::new(Arc::new(governor_conf))),
        None => {
            warn!("rate limiter configuration rejected; serving without rate limiting");
            routes
        }
    };

    // Last layer added runs first: the id is set before tracing and
    // propagation see the request.
    routes
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::request_id::SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            tower_http::request_id::MakeRequestUuid,
        ))
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            debug!(error = %rejection, "request body over limit");
            Err(ApiError::PayloadTooLarge)
        }
        Err(rejection) => {
            debug!(error = %rejection, "rejected request body");
            Err(ApiError::BadRequest(String::from("Requisicao invalida.")))
        }
    }
}

async fn load_products(state: &AppState, only_active: bool) -> Result<Vec<Product>, BackendError> {
    let rows = state.backend.list_products(only_active).await?;
    Ok(map_products(rows, state.storage_base.as_deref()))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> (StatusCode, Json<ProductsResponse>) {
    match load_products(&state, query.only_active()).await {
        Ok(products) => {
            debug!(
                products = products.len(),
                only_active = query.only_active(),
                "products listed"
            );
            (
                StatusCode::OK,
                Json(ProductsResponse {
                    success: true,
                    products,
                    message: None,
                }),
            )
        }
        Err(err) => {
            error!(error = %err, "fetch products failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProductsResponse {
                    success: false,
                    products: Vec::new(),
                    message: Some(String::from("Erro ao carregar produtos.")),
                }),
            )
        }
    }
}

async fn catalog_json(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let products = load_products(&state, true)
        .await
        .map_err(|err| ApiError::from_backend(&err, |_| String::from("Erro ao carregar produtos.")))?;
    let categories = available_categories(&products);

    let selected = query
        .categoria
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let visible = match selected {
        Some(category) => products
            .into_iter()
            .filter(|product| normalize_category(product.category.as_deref()) == category)
            .collect(),
        None => products,
    };

    Ok(Json(CatalogResponse {
        success: true,
        categories,
        groups: group_by_category(visible),
    }))
}

async fn catalog_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let products = load_products(&state, true)
        .await
        .map_err(|err| ApiError::from_backend(&err, |_| String::from("Erro ao carregar produtos.")))?;
    Ok(Html(render_catalog_page(&group_by_category(products))))
}

async fn terms() -> Json<LegalResponse> {
    let snapshot = TermsSnapshot::current();
    Json(LegalResponse {
        success: true,
        version: Some(snapshot.version),
        hash: Some(snapshot.hash),
        text: snapshot.text,
    })
}

async fn privacy() -> Json<LegalResponse> {
    Json(LegalResponse {
        success: true,
        version: None,
        hash: None,
        text: PRIVACY_TEXT,
    })
}

/// Existing cart id from the cookie, or a fresh one with its cookie added.
fn cart_id(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    match jar.get(CART_COOKIE).map(|cookie| cookie.value().to_string()) {
        Some(id) => (jar, id),
        None => {
            let id = state.carts.new_id();
            let jar = jar.add(cart_cookie(id.clone(), state.secure_cookies));
            (jar, id)
        }
    }
}

async fn price_cart(state: &AppState, cart: &Cart) -> Result<CartSummary, ApiError> {
    if cart.is_empty() {
        return Ok(cart.detail(&[]));
    }
    let products = load_products(state, true)
        .await
        .map_err(|err| ApiError::from_backend(&err, |_| String::from("Erro ao carregar carrinho.")))?;
    Ok(cart.detail(&products))
}

async fn cart_show(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = jar
        .get(CART_COOKIE)
        .map(|cookie| state.carts.get(cookie.value()))
        .unwrap_or_default();
    Ok(Json(CartResponse {
        success: true,
        cart: price_cart(&state, &cart).await?,
    }))
}

async fn cart_add(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(product_id): Path<String>,
) -> Result<(CookieJar, Json<CartResponse>), ApiError> {
    let products = load_products(&state, true)
        .await
        .map_err(|err| ApiError::from_backend(&err, |_| String::from("Erro ao carregar carrinho.")))?;
    if !products.iter().any(|product| product.id == product_id) {
        return Err(ApiError::NotFound(String::from("Produto nao encontrado.")));
    }

    let (jar, id) = cart_id(&state, jar);
    let cart = state.carts.update(&id, |cart| cart.add(&product_id));
    debug!(product_id = %product_id, lines = cart.lines().len(), "cart item added");
    Ok((
        jar,
        Json(CartResponse {
            success: true,
            cart: cart.detail(&products),
        }),
    ))
}

async fn cart_decrease(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(product_id): Path<String>,
) -> Result<(CookieJar, Json<CartResponse>), ApiError> {
    let (jar, id) = cart_id(&state, jar);
    let cart = state.carts.update(&id, |cart| cart.decrease(&product_id));
    let summary = price_cart(&state, &cart).await?;
    Ok((
        jar,
        Json(CartResponse {
            success: true,
            cart: summary,
        }),
    ))
}

async fn cart_remove(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(product_id): Path<String>,
) -> Result<(CookieJar, Json<CartResponse>), ApiError> {
    let (jar, id) = cart_id(&state, jar);
    let cart = state.carts.update(&id, |cart| cart.remove(&product_id));
    let summary = price_cart(&state, &cart).await?;
    Ok((
        jar,
        Json(CartResponse {
            success: true,
            cart: summary,
        }),
    ))
}

async fn cart_clear(State(state): State<AppState>, jar: CookieJar) -> Json<CartResponse> {
    let cart = match jar.get(CART_COOKIE) {
        Some(cookie) => state.carts.update(cookie.value(), Cart::clear),
        None => Cart::default(),
    };
    Json(CartResponse {
        success: true,
        cart: cart.detail(&[]),
    })
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request = body(payload)?;
    let registered = register_customer(state.backend.as_ref(), &request, RetryPolicy::default())
        .await
        .map_err(|err| ApiError::from_store(err, |_| String::from("Erro ao criar conta.")))?;
    debug!(
        user_id = %registered.user_id,
        cliente_id = %registered.cliente_id,
        new_user = registered.new_user,
        "signup completed"
    );
    Ok(Json(SuccessResponse::ok()))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let request = body(payload)?;
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_lowercase();
    let password = request.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(String::from("Informe e-mail e senha.")));
    }

    let auth = match state.backend.sign_in_with_password(&email, &password).await {
        Ok(auth) => auth,
        Err(err) if err.is_not_configured() => return Err(ApiError::NotConfigured),
        Err(BackendError::Api { message, .. }) => {
            warn!(email = %email, message = %message, "sign in rejected");
            return Err(ApiError::BadRequest(message));
        }
        Err(err) => {
            error!(error = %err, "sign in failed");
            return Err(ApiError::Internal(String::from("Erro ao autenticar.")));
        }
    };

    let cliente = state
        .backend
        .find_cliente_by_user_id(&auth.user.id)
        .await
        .map_err(|err| {
            ApiError::from_backend(&err, |_| String::from("Erro ao autenticar."))
        })?;

    let token = state.sessions.create(Session {
        user: auth.user.clone(),
        access_token: auth.access_token,
    });
    let jar = jar.add(session_cookie(
        token.clone(),
        state.sessions.ttl(),
        state.secure_cookies,
    ));
    info!(
        user_id = %auth.user.id,
        backend_expires_in = ?auth.expires_in,
        "customer signed in"
    );

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: auth.user.into(),
            cliente,
            token,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, Json<SuccessResponse>) {
    let bearer = bearer_token(&headers).map(String::from);
    let token = bearer
        .clone()
        .or_else(|| jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()));

    let access_token = match token.as_deref().and_then(|token| state.sessions.remove(token)) {
        Some(session) => {
            info!(user_id = %session.user.id, "customer signed out");
            Some(session.access_token)
        }
        None => bearer,
    };
    if let Some(access_token) = access_token {
        if let Err(err) = state.backend.sign_out(&access_token).await {
            warn!(error = %err, "backend sign out failed");
        }
    }

    (
        jar.remove(removal_cookie(SESSION_COOKIE)),
        Json(SuccessResponse::ok()),
    )
}

async fn session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Json<SessionResponse> {
    let Some(session) = current_session(&state, &headers, &jar).await else {
        return Json(SessionResponse::anonymous());
    };
    let cliente = match state.backend.find_cliente_by_user_id(&session.user.id).await {
        Ok(cliente) => cliente,
        Err(err) => {
            error!(user_id = %session.user.id, error = %err, "session customer lookup failed");
            return Json(SessionResponse::anonymous());
        }
    };
    Json(SessionResponse {
        user: Some(session.user.into()),
        cliente,
    })
}

async fn update_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<ClienteResponse>, ApiError> {
    let session = require_session(&state, &headers, &jar).await?;
    let update = body(payload)?;
    let cliente = update_customer(state.backend.as_ref(), &session.user.id, update)
        .await
        .map_err(|err| {
            ApiError::from_store(err, |_| String::from("Erro ao atualizar dados do cliente."))
        })?;
    Ok(Json(ClienteResponse {
        success: true,
        cliente,
    }))
}

async fn my_orders(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MyOrdersResponse>, ApiError> {
    let session = require_session(&state, &headers, &jar).await?;
    let orders = list_my_orders(state.backend.as_ref(), &session.user.id)
        .await
        .map_err(|err| ApiError::from_store(err, |_| String::from("Erro ao buscar pedidos.")))?;
    debug!(
        user_id = %session.user.id,
        pedidos = orders.pedidos.len(),
        personalizados = orders.personalizados.len(),
        "customer orders listed"
    );
    Ok(Json(MyOrdersResponse {
        success: true,
        pedidos: orders.pedidos,
        personalizados: orders.personalizados,
    }))
}

async fn create_order(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let request = body(payload)?;
    let submitted = submit_order(
        state.backend.as_ref(),
        &state.submissions,
        &request,
        client_ip(&headers),
    )
    .await
    .map_err(|err| ApiError::from_store(err, |err| format!("Erro ao registrar pedido: {err}")))?;

    if let Some(cookie) = jar.get(CART_COOKIE) {
        state.carts.remove(cookie.value());
    }
    Ok(Json(SubmissionResponse {
        success: true,
        whatsapp_url: submitted.whatsapp_url,
    }))
}

async fn create_custom_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CustomPlanRequest>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let request = body(payload)?;
    let submitted = submit_custom_plan(
        state.backend.as_ref(),
        &state.submissions,
        &request,
        client_ip(&headers),
    )
    .await
    .map_err(|err| {
        ApiError::from_store(err, |err| {
            format!("Erro ao registrar plano personalizado: {err}")
        })
    })?;
    Ok(Json(SubmissionResponse {
        success: true,
        whatsapp_url: submitted.whatsapp_url,
    }))
}
