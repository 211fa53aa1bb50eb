use serde::{Deserialize, Serialize};

use crate::backend::{AuthUser, ClienteRow, PedidoPersonalizadoRow, PedidoRow};
use crate::cart::CartSummary;
use crate::catalog::{CategoryGroup, Product};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub active: Option<String>,
}

impl ProductsQuery {
    /// Only `active=false` lists inactive products too.
    pub fn only_active(&self) -> bool {
        self.active.as_deref() != Some("false")
    }
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub success: bool,
    pub products: Vec<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub categoria: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub success: bool,
    pub categories: Vec<String>,
    pub groups: Vec<CategoryGroup>,
}

#[derive(Debug, Serialize)]
pub struct LegalResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub text: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub cart: CartSummary,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
}

impl From<AuthUser> for UserSummary {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserSummary,
    pub cliente: Option<ClienteRow>,
    /// Same value as the session cookie, for clients sending `Authorization: Bearer`.
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<UserSummary>,
    pub cliente: Option<ClienteRow>,
}

impl SessionResponse {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            cliente: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClienteResponse {
    pub success: bool,
    pub cliente: ClienteRow,
}

#[derive(Debug, Serialize)]
pub struct MyOrdersResponse {
    pub success: bool,
    pub pedidos: Vec<PedidoRow>,
    pub personalizados: Vec<PedidoPersonalizadoRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    pub whatsapp_url: String,
}
