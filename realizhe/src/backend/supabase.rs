use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::SupabaseConfig;

use super::error::{BackendError, NOT_SINGLE_ROW};
use super::types::{
    AdminUserAttributes, AuthSession, AuthUser, ClienteRow, ClienteUpsert, EnsureClienteArgs,
    NewPedido, NewPedidoPersonalizado, PedidoPersonalizadoRow, PedidoRow, ProductRow,
    TermsAcceptance,
};
use super::Backend;

const PRODUCT_COLUMNS: &str = "id,slug,nome,descricao,preco,imagem_path,categoria,destaques,ativo";
const SERVICE_KEY_MISSING: &str = "Supabase service key not configured";
const ANON_KEY_MISSING: &str = "Supabase anon key not configured";

/// Client for a hosted Supabase project.
///
/// Table, RPC, admin and storage calls use the service-role key. Password
/// sign-in and user lookups use the anon key with the caller's access token.
#[derive(Debug, Clone)]
pub struct SupabaseBackend {
    client: reqwest::Client,
    url: Option<String>,
    anon_key: Option<String>,
    service_key: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum KeyKind {
    Service,
    Anon,
}

impl SupabaseBackend {
    pub fn new(config: &SupabaseConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("realizhe/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: config
                .url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            anon_key: config.anon_key.clone(),
            service_key: config.service_role_key.clone(),
        }
    }

    pub fn has_service_key(&self) -> bool {
        self.url.is_some() && self.service_key.is_some()
    }

    pub fn has_anon_key(&self) -> bool {
        self.url.is_some() && self.anon_key.is_some()
    }

    fn request(
        &self,
        kind: KeyKind,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, BackendError> {
        let (key, missing) = match kind {
            KeyKind::Service => (self.service_key.as_deref(), SERVICE_KEY_MISSING),
            KeyKind::Anon => (self.anon_key.as_deref(), ANON_KEY_MISSING),
        };
        let (Some(url), Some(key)) = (self.url.as_deref(), key) else {
            return Err(BackendError::NotConfigured(missing));
        };
        debug!(method = %method, path, "backend request");
        Ok(self
            .client
            .request(method, format!("{url}{path}"))
            .header("apikey", key)
            .bearer_auth(key))
    }

    /// Anon `apikey` with the caller's access token as the only bearer.
    fn user_request(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
    ) -> Result<RequestBuilder, BackendError> {
        let (Some(url), Some(key)) = (self.url.as_deref(), self.anon_key.as_deref()) else {
            return Err(BackendError::NotConfigured(ANON_KEY_MISSING));
        };
        debug!(method = %method, path, "backend user request");
        Ok(self
            .client
            .request(method, format!("{url}{path}"))
            .header("apikey", key)
            .bearer_auth(access_token))
    }

    fn rest(&self, method: Method, table: &str) -> Result<RequestBuilder, BackendError> {
        self.request(KeyKind::Service, method, &format!("/rest/v1/{table}"))
    }

    async fn rpc<A: Serialize + Sync>(
        &self,
        function: &str,
        args: &A,
    ) -> Result<serde_json::Value, BackendError> {
        let request = self
            .request(KeyKind::Service, Method::POST, &format!("/rest/v1/rpc/{function}"))?
            .json(args);
        let bytes = execute(request).await?.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn execute(request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::from_response(status.as_u16(), &body))
}

async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
    let bytes = execute(request).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Collapse a result set into at most one row, PostgREST `maybeSingle` style.
fn at_most_one<T>(mut rows: Vec<T>) -> Result<Option<T>, BackendError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        n => Err(BackendError::api(
            406,
            Some(NOT_SINGLE_ROW),
            format!("JSON object requested, multiple ({n}) rows returned"),
        )),
    }
}

/// Double-quote a filter value so reserved PostgREST characters survive.
fn quote_filter_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn id_from_rpc_result(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Array(items) => items.first().and_then(id_from_rpc_result),
        serde_json::Value::Object(map) => map.get("id").and_then(|id| match id {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }),
        serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn list_products(&self, only_active: bool) -> Result<Vec<ProductRow>, BackendError> {
        let mut query = vec![("select", PRODUCT_COLUMNS), ("order", "nome.asc")];
        if only_active {
            query.push(("ativo", "eq.true"));
        }
        fetch_json(self.rest(Method::GET, "produtos")?.query(&query)).await
    }

    async fn find_cliente_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<ClienteRow>, BackendError> {
        let filter = format!("eq.{user_id}");
        let rows: Vec<ClienteRow> = fetch_json(
            self.rest(Method::GET, "clientes")?
                .query(&[("select", "*"), ("user_id", filter.as_str())]),
        )
        .await?;
        at_most_one(rows)
    }

    async fn find_cliente_by_contact(
        &self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<ClienteRow>, BackendError> {
        let mut conditions = vec![format!("telefone.eq.{}", quote_filter_value(phone))];
        if let Some(email) = email.filter(|email| !email.is_empty()) {
            conditions.push(format!("email.eq.{}", quote_filter_value(email)));
        }
        let filter = format!("({})", conditions.join(","));
        let rows: Vec<ClienteRow> = fetch_json(
            self.rest(Method::GET, "clientes")?
                .query(&[("select", "*"), ("or", filter.as_str())]),
        )
        .await?;
        at_most_one(rows)
    }

    async fn upsert_cliente(&self, cliente: &ClienteUpsert) -> Result<ClienteRow, BackendError> {
        #[derive(Serialize)]
        struct Stamped<'a> {
            #[serde(flatten)]
            row: &'a ClienteUpsert,
            updated_at: chrono::DateTime<Utc>,
        }

        let rows: Vec<ClienteRow> = fetch_json(
            self.rest(Method::POST, "clientes")?
                .query(&[("on_conflict", "user_id")])
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(&Stamped {
                    row: cliente,
                    updated_at: Utc::now(),
                }),
        )
        .await?;
        at_most_one(rows)?.ok_or_else(|| {
            BackendError::api(406, Some(NOT_SINGLE_ROW), "upsert returned no rows")
        })
    }

    async fn ensure_cliente_with_terms(
        &self,
        args: &EnsureClienteArgs,
    ) -> Result<Option<String>, BackendError> {
        let value = self.rpc("ensure_cliente_with_terms", args).await?;
        Ok(id_from_rpc_result(&value))
    }

    async fn upsert_terms_acceptance(
        &self,
        acceptance: &TermsAcceptance,
    ) -> Result<(), BackendError> {
        execute(
            self.rest(Method::POST, "termos_aceite")?
                .query(&[("on_conflict", "cliente_id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(acceptance),
        )
        .await?;
        Ok(())
    }

    async fn insert_pedido(&self, pedido: &NewPedido) -> Result<(), BackendError> {
        execute(
            self.rest(Method::POST, "pedidos")?
                .header("Prefer", "return=minimal")
                .json(pedido),
        )
        .await?;
        Ok(())
    }

    async fn insert_pedido_personalizado(
        &self,
        plano: &NewPedidoPersonalizado,
    ) -> Result<(), BackendError> {
        execute(
            self.rest(Method::POST, "pedidos_personalizados")?
                .header("Prefer", "return=minimal")
                .json(plano),
        )
        .await?;
        Ok(())
    }

    async fn list_pedidos(&self, cliente_id: &str) -> Result<Vec<PedidoRow>, BackendError> {
        let filter = format!("eq.{cliente_id}");
        fetch_json(self.rest(Method::GET, "pedidos")?.query(&[
            ("select", "*"),
            ("cliente_id", filter.as_str()),
            ("order", "criado_em.desc"),
        ]))
        .await
    }

    async fn list_pedidos_personalizados(
        &self,
        cliente_id: &str,
    ) -> Result<Vec<PedidoPersonalizadoRow>, BackendError> {
        let filter = format!("eq.{cliente_id}");
        fetch_json(self.rest(Method::GET, "pedidos_personalizados")?.query(&[
            ("select", "*"),
            ("cliente_id", filter.as_str()),
            ("order", "criado_em.desc"),
        ]))
        .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        fetch_json(
            self.request(KeyKind::Anon, Method::POST, "/auth/v1/token")?
                .query(&[("grant_type", "password")])
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError> {
        let request = self.user_request(Method::GET, "/auth/v1/user", access_token)?;
        match fetch_json::<AuthUser>(request).await {
            Ok(user) => Ok(Some(user)),
            Err(err)
                if matches!(
                    err.status().and_then(|s| StatusCode::from_u16(s).ok()),
                    Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        execute(self.user_request(Method::POST, "/auth/v1/logout", access_token)?).await?;
        Ok(())
    }

    async fn auth_user_id_by_email(&self, email: &str) -> Result<Option<String>, BackendError> {
        let value = self
            .rpc(
                "auth_user_id_by_email",
                &serde_json::json!({ "p_email": email }),
            )
            .await?;
        Ok(id_from_rpc_result(&value))
    }

    async fn admin_create_user(
        &self,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, BackendError> {
        fetch_json(
            self.request(KeyKind::Service, Method::POST, "/auth/v1/admin/users")?
                .json(attributes),
        )
        .await
    }

    async fn admin_update_user(
        &self,
        user_id: &str,
        attributes: &AdminUserAttributes,
    ) -> Result<(), BackendError> {
        execute(
            self.request(
                KeyKind::Service,
                Method::PUT,
                &format!("/auth/v1/admin/users/{user_id}"),
            )?
            .json(attributes),
        )
        .await?;
        Ok(())
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), BackendError> {
        execute(self.request(
            KeyKind::Service,
            Method::DELETE,
            &format!("/auth/v1/admin/users/{user_id}"),
        )?)
        .await?;
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        execute(
            self.request(
                KeyKind::Service,
                Method::POST,
                &format!("/storage/v1/object/{bucket}/{path}"),
            )?
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes),
        )
        .await?;
        Ok(())
    }

    fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{path}",
            self.url.as_deref().unwrap_or_default()
        )
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, BackendError> {
        #[derive(serde::Deserialize)]
        struct Signed {
            #[serde(rename = "signedURL", alias = "signedUrl")]
            signed_url: String,
        }

        let signed: Signed = fetch_json(
            self.request(
                KeyKind::Service,
                Method::POST,
                &format!("/storage/v1/object/sign/{bucket}/{path}"),
            )?
            .json(&serde_json::json!({ "expiresIn": expires_in.as_secs() })),
        )
        .await?;

        if signed.signed_url.starts_with("http") {
            return Ok(signed.signed_url);
        }
        Ok(format!(
            "{}/storage/v1{}",
            self.url.as_deref().unwrap_or_default(),
            signed.signed_url
        ))
    }
}
