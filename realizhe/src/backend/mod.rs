//! Hosted backend access: relational tables, auth users and object storage.
//!
//! [`Backend`] is the seam every request handler goes through. Production runs
//! use [`SupabaseBackend`], which speaks the PostgREST, GoTrue and Storage REST
//! dialects. [`MemoryBackend`] keeps the same semantics in-process.

mod error;
mod memory;
mod supabase;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use supabase::SupabaseBackend;
pub use types::{
    AdminUserAttributes, AuthSession, AuthUser, ClienteRow, ClienteUpsert, CustomPlanDetails,
    EnsureClienteArgs, NewPedido, NewPedidoPersonalizado, OrderItem, PedidoPersonalizadoRow,
    PedidoRow, ProductRow, TermsAcceptance, UserMetadata,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Products ordered by name.
    async fn list_products(&self, only_active: bool) -> Result<Vec<ProductRow>, BackendError>;

    async fn find_cliente_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<ClienteRow>, BackendError>;

    /// Customer whose phone or email matches. Several matches is an error.
    async fn find_cliente_by_contact(
        &self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<ClienteRow>, BackendError>;

    async fn upsert_cliente(&self, cliente: &ClienteUpsert) -> Result<ClienteRow, BackendError>;

    /// Find-or-create a customer by phone/email and record terms acceptance.
    /// Returns the customer id when the procedure reports one.
    async fn ensure_cliente_with_terms(
        &self,
        args: &EnsureClienteArgs,
    ) -> Result<Option<String>, BackendError>;

    async fn upsert_terms_acceptance(
        &self,
        acceptance: &TermsAcceptance,
    ) -> Result<(), BackendError>;

    async fn insert_pedido(&self, pedido: &NewPedido) -> Result<(), BackendError>;

    async fn insert_pedido_personalizado(
        &self,
        plano: &NewPedidoPersonalizado,
    ) -> Result<(), BackendError>;

    /// Newest first.
    async fn list_pedidos(&self, cliente_id: &str) -> Result<Vec<PedidoRow>, BackendError>;

    /// Newest first.
    async fn list_pedidos_personalizados(
        &self,
        cliente_id: &str,
    ) -> Result<Vec<PedidoPersonalizadoRow>, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError>;

    /// `None` when the token is unknown or expired.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn auth_user_id_by_email(&self, email: &str) -> Result<Option<String>, BackendError>;

    async fn admin_create_user(
        &self,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, BackendError>;

    async fn admin_update_user(
        &self,
        user_id: &str,
        attributes: &AdminUserAttributes,
    ) -> Result<(), BackendError>;

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), BackendError>;

    /// Store a new object. Existing paths are not overwritten.
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError>;

    fn public_object_url(&self, bucket: &str, path: &str) -> String;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, BackendError>;
}
