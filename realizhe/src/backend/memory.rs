use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::{BackendError, FOREIGN_KEY_VIOLATION};
use super::types::{
    AdminUserAttributes, AuthSession, AuthUser, ClienteRow, ClienteUpsert, EnsureClienteArgs,
    NewPedido, NewPedidoPersonalizado, PedidoPersonalizadoRow, PedidoRow, ProductRow,
    TermsAcceptance, UserMetadata,
};
use super::Backend;

const PUBLIC_OBJECT_PREFIX: &str = "/storage/v1/object/public";
const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// In-process backend with the same constraints as the hosted schema:
/// one customer per `user_id`, one terms row per customer, and customer
/// `user_id` must reference an existing auth user.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    #[cfg(test)]
    fail_cliente_lookups: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Default)]
struct Tables {
    products: Vec<ProductRow>,
    users: HashMap<String, MemoryUser>,
    /// Access token -> (user id, expires at).
    access_tokens: HashMap<String, (String, Instant)>,
    clientes: Vec<ClienteRow>,
    terms: HashMap<String, TermsAcceptance>,
    pedidos: Vec<PedidoRow>,
    personalizados: Vec<PedidoPersonalizadoRow>,
    objects: HashMap<(String, String), StoredObject>,
    #[cfg(test)]
    pending_fk_failures: usize,
    #[cfg(test)]
    pending_ensure_misses: usize,
}

#[derive(Debug, Clone)]
struct MemoryUser {
    email: String,
    password: String,
    #[allow(dead_code)]
    metadata: UserMetadata,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

impl MemoryBackend {
    pub fn with_products(products: Vec<ProductRow>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                products,
                ..Default::default()
            }),
            #[cfg(test)]
            fail_cliente_lookups: Default::default(),
        }
    }
}

#[cfg(test)]
impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` customer upserts fail with a foreign key violation.
    pub async fn fail_next_upserts_with_foreign_key(&self, count: usize) {
        self.tables.write().await.pending_fk_failures = count;
    }

    /// Make the next `count` ensure calls report no customer id and store
    /// nothing, like a procedure that returns an empty result.
    pub async fn miss_next_ensures(&self, count: usize) {
        self.tables.write().await.pending_ensure_misses = count;
    }

    /// Push every issued access token past its expiry.
    pub async fn expire_access_tokens(&self) {
        let now = Instant::now();
        for (_, expires) in self.tables.write().await.access_tokens.values_mut() {
            *expires = now;
        }
    }

    /// Make customer lookups by auth user fail until switched off.
    pub fn fail_cliente_lookups(&self, fail: bool) {
        self.fail_cliente_lookups
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn access_token_count(&self) -> usize {
        self.tables.read().await.access_tokens.len()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn clientes(&self) -> Vec<ClienteRow> {
        self.tables.read().await.clientes.clone()
    }

    pub async fn terms_for(&self, cliente_id: &str) -> Option<TermsAcceptance> {
        self.tables.read().await.terms.get(cliente_id).cloned()
    }

    pub async fn stored_object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.tables
            .read()
            .await
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.tables
            .read()
            .await
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl Tables {
    fn user_by_email(&self, email: &str) -> Option<(&String, &MemoryUser)> {
        self.users
            .iter()
            .find(|(_, user)| user.email.eq_ignore_ascii_case(email))
    }

    fn cliente_by_contact(&self, phone: &str, email: Option<&str>) -> Vec<usize> {
        self.clientes
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.telefone.as_deref() == Some(phone)
                    || email.is_some_and(|email| {
                        !email.is_empty() && row.email.as_deref() == Some(email)
                    })
            })
            .map(|(idx, _)| idx)
            .collect()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn merge_field(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

fn not_single_row(count: usize) -> BackendError {
    BackendError::api(
        406,
        Some(super::error::NOT_SINGLE_ROW),
        format!("JSON object requested, multiple ({count}) rows returned"),
    )
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_products(&self, only_active: bool) -> Result<Vec<ProductRow>, BackendError> {
        let tables = self.tables.read().await;
        let mut products = tables
            .products
            .iter()
            .filter(|row| !only_active || row.ativo == Some(true))
            .cloned()
            .collect::<Vec<_>>();
        products.sort_by(|left, right| left.nome.cmp(&right.nome));
        Ok(products)
    }

    async fn find_cliente_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<ClienteRow>, BackendError> {
        #[cfg(test)]
        if self
            .fail_cliente_lookups
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(BackendError::api(503, None, "lookup unavailable"));
        }
        let tables = self.tables.read().await;
        Ok(tables
            .clientes
            .iter()
            .find(|row| row.user_id.as_deref() == Some(user_id))
            .cloned())
    }

    async fn find_cliente_by_contact(
        &self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Option<ClienteRow>, BackendError> {
        let tables = self.tables.read().await;
        let matches = tables.cliente_by_contact(phone, email);
        match matches.as_slice() {
            [] => Ok(None),
            [idx] => Ok(tables.clientes.get(*idx).cloned()),
            many => Err(not_single_row(many.len())),
        }
    }

    async fn upsert_cliente(&self, cliente: &ClienteUpsert) -> Result<ClienteRow, BackendError> {
        let mut tables = self.tables.write().await;

        #[cfg(test)]
        if tables.pending_fk_failures > 0 {
            tables.pending_fk_failures -= 1;
            return Err(BackendError::api(
                409,
                Some(FOREIGN_KEY_VIOLATION),
                "insert or update on table \"clientes\" violates foreign key constraint \"clientes_user_id_fkey\"",
            ));
        }

        if !tables.users.contains_key(&cliente.user_id) {
            return Err(BackendError::api(
                409,
                Some(FOREIGN_KEY_VIOLATION),
                "insert or update on table \"clientes\" violates foreign key constraint \"clientes_user_id_fkey\"",
            ));
        }

        let now = Utc::now();
        let position = tables
            .clientes
            .iter()
            .position(|row| row.user_id.as_deref() == Some(cliente.user_id.as_str()));
        let idx = match position {
            Some(idx) => idx,
            None => {
                tables.clientes.push(ClienteRow {
                    id: new_id(),
                    user_id: Some(cliente.user_id.clone()),
                    nome: None,
                    email: None,
                    telefone: None,
                    cpf: None,
                    endereco: None,
                    cidade: None,
                    cep: None,
                    aceite_termos: None,
                    hash_termos: None,
                    data_aceite: None,
                    updated_at: None,
                });
                tables.clientes.len() - 1
            }
        };

        let row = &mut tables.clientes[idx];
        merge_field(&mut row.nome, &cliente.nome);
        merge_field(&mut row.email, &cliente.email);
        merge_field(&mut row.telefone, &cliente.telefone);
        merge_field(&mut row.cpf, &cliente.cpf);
        merge_field(&mut row.endereco, &cliente.endereco);
        merge_field(&mut row.cidade, &cliente.cidade);
        merge_field(&mut row.cep, &cliente.cep);
        merge_field(&mut row.hash_termos, &cliente.hash_termos);
        if cliente.aceite_termos.is_some() {
            row.aceite_termos = cliente.aceite_termos;
        }
        if cliente.data_aceite.is_some() {
            row.data_aceite = cliente.data_aceite;
        }
        row.updated_at = Some(now);
        Ok(row.clone())
    }

    async fn ensure_cliente_with_terms(
        &self,
        args: &EnsureClienteArgs,
    ) -> Result<Option<String>, BackendError> {
        let mut tables = self.tables.write().await;
        #[cfg(test)]
        if tables.pending_ensure_misses > 0 {
            tables.pending_ensure_misses -= 1;
            return Ok(None);
        }
        let email = args.email.as_deref();
        let matches = tables.cliente_by_contact(&args.phone, email);
        let idx = match matches.as_slice() {
            [] => {
                tables.clientes.push(ClienteRow {
                    id: new_id(),
                    user_id: None,
                    nome: Some(args.nome.clone()),
                    email: args.email.clone(),
                    telefone: Some(args.phone.clone()),
                    cpf: args.cpf.clone(),
                    endereco: Some(args.endereco.clone()),
                    cidade: args.cidade.clone(),
                    cep: args.cep.clone(),
                    aceite_termos: None,
                    hash_termos: None,
                    data_aceite: None,
                    updated_at: None,
                });
                tables.clientes.len() - 1
            }
            [idx, ..] => *idx,
        };

        let row = &mut tables.clientes[idx];
        row.nome = Some(args.nome.clone());
        row.endereco = Some(args.endereco.clone());
        merge_field(&mut row.cidade, &args.cidade);
        merge_field(&mut row.cep, &args.cep);
        merge_field(&mut row.cpf, &args.cpf);
        row.aceite_termos = Some(true);
        row.hash_termos = Some(format!("{}:{}", args.terms_version, args.terms_hash));
        row.data_aceite = Some(args.terms_acceptance);
        row.updated_at = Some(Utc::now());
        let id = row.id.clone();

        tables.terms.insert(
            id.clone(),
            TermsAcceptance {
                cliente_id: id.clone(),
                versao_termos: args.terms_version.clone(),
                hash_termos: args.terms_hash.clone(),
                data_aceite: args.terms_acceptance,
                aceitou_lgpd: true,
            },
        );
        debug!(cliente_id = %id, "memory customer ensured");
        Ok(Some(id))
    }

    async fn upsert_terms_acceptance(
        &self,
        acceptance: &TermsAcceptance,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        if !tables
            .clientes
            .iter()
            .any(|row| row.id == acceptance.cliente_id)
        {
            return Err(BackendError::api(
                409,
                Some(FOREIGN_KEY_VIOLATION),
                "insert or update on table \"termos_aceite\" violates foreign key constraint",
            ));
        }
        tables
            .terms
            .insert(acceptance.cliente_id.clone(), acceptance.clone());
        Ok(())
    }

    async fn insert_pedido(&self, pedido: &NewPedido) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        tables.pedidos.push(PedidoRow {
            id: new_id(),
            cliente_id: pedido.cliente_id.clone(),
            tipo_pedido: Some(pedido.tipo_pedido.clone()),
            itens: serde_json::to_value(&pedido.itens)?,
            valor_total: pedido.valor_total,
            forma_pagamento: Some(pedido.forma_pagamento.clone()),
            observacoes: pedido.observacoes.clone(),
            criado_em: Some(Utc::now()),
        });
        Ok(())
    }

    async fn insert_pedido_personalizado(
        &self,
        plano: &NewPedidoPersonalizado,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        tables.personalizados.push(PedidoPersonalizadoRow {
            id: new_id(),
            cliente_id: plano.cliente_id.clone(),
            plano: serde_json::to_value(&plano.plano)?,
            frequencia: Some(plano.frequencia.clone()),
            forma_pagamento: Some(plano.forma_pagamento.clone()),
            valor_estimado: plano.valor_estimado,
            observacoes: plano.observacoes.clone(),
            arquivo_plano: plano.arquivo_plano.clone(),
            criado_em: Some(Utc::now()),
        });
        Ok(())
    }

    async fn list_pedidos(&self, cliente_id: &str) -> Result<Vec<PedidoRow>, BackendError> {
        let tables = self.tables.read().await;
        let mut rows = tables
            .pedidos
            .iter()
            .rev()
            .filter(|row| row.cliente_id == cliente_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.criado_em.cmp(&left.criado_em));
        Ok(rows)
    }

    async fn list_pedidos_personalizados(
        &self,
        cliente_id: &str,
    ) -> Result<Vec<PedidoPersonalizadoRow>, BackendError> {
        let tables = self.tables.read().await;
        let mut rows = tables
            .personalizados
            .iter()
            .rev()
            .filter(|row| row.cliente_id == cliente_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.criado_em.cmp(&left.criado_em));
        Ok(rows)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let mut tables = self.tables.write().await;
        let Some((user_id, user)) = tables
            .user_by_email(email)
            .filter(|(_, user)| user.password == password)
            .map(|(id, user)| (id.clone(), user.clone()))
        else {
            return Err(BackendError::api(
                400,
                Some("invalid_grant"),
                "Invalid login credentials",
            ));
        };

        let now = Instant::now();
        tables.access_tokens.retain(|_, (_, expires)| *expires > now);
        let access_token = new_id();
        tables
            .access_tokens
            .insert(access_token.clone(), (user_id.clone(), now + ACCESS_TOKEN_TTL));
        Ok(AuthSession {
            access_token,
            expires_in: Some(ACCESS_TOKEN_TTL.as_secs()),
            user: AuthUser {
                id: user_id,
                email: Some(user.email),
            },
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, BackendError> {
        let tables = self.tables.read().await;
        let live = tables
            .access_tokens
            .get(access_token)
            .filter(|(_, expires)| *expires > Instant::now());
        Ok(live.and_then(|(user_id, _)| {
            tables.users.get(user_id).map(|user| AuthUser {
                id: user_id.clone(),
                email: Some(user.email.clone()),
            })
        }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.tables.write().await.access_tokens.remove(access_token);
        Ok(())
    }

    async fn auth_user_id_by_email(&self, email: &str) -> Result<Option<String>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables.user_by_email(email).map(|(id, _)| id.clone()))
    }

    async fn admin_create_user(
        &self,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, BackendError> {
        let mut tables = self.tables.write().await;
        let Some(email) = attributes.email.as_deref().filter(|e| e.contains('@')) else {
            return Err(BackendError::api(
                400,
                Some("validation_failed"),
                "Unable to validate email address: invalid email format",
            ));
        };
        if tables.user_by_email(email).is_some() {
            return Err(BackendError::api(
                422,
                Some("email_exists"),
                "A user with this email address has already been registered",
            ));
        }
        if attributes.password.len() < 6 {
            return Err(BackendError::api(
                422,
                Some("weak_password"),
                "Password should be at least 6 characters.",
            ));
        }

        let id = new_id();
        tables.users.insert(
            id.clone(),
            MemoryUser {
                email: email.to_ascii_lowercase(),
                password: attributes.password.clone(),
                metadata: attributes.user_metadata.clone(),
            },
        );
        Ok(AuthUser {
            id,
            email: Some(email.to_ascii_lowercase()),
        })
    }

    async fn admin_update_user(
        &self,
        user_id: &str,
        attributes: &AdminUserAttributes,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(user_id) else {
            return Err(BackendError::api(404, Some("user_not_found"), "User not found"));
        };
        user.password.clone_from(&attributes.password);
        user.metadata = attributes.user_metadata.clone();
        if let Some(email) = &attributes.email {
            user.email = email.to_ascii_lowercase();
        }
        Ok(())
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(user_id).is_none() {
            return Err(BackendError::api(404, Some("user_not_found"), "User not found"));
        }
        tables.access_tokens.retain(|_, (owner, _)| owner.as_str() != user_id);
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        let key = (bucket.to_string(), path.to_string());
        if tables.objects.contains_key(&key) {
            return Err(BackendError::api(
                409,
                Some("Duplicate"),
                "The resource already exists",
            ));
        }
        tables.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_OBJECT_PREFIX}/{bucket}/{path}")
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, BackendError> {
        let tables = self.tables.read().await;
        if !tables
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
        {
            return Err(BackendError::api(404, Some("not_found"), "Object not found"));
        }
        Ok(format!(
            "/storage/v1/object/sign/{bucket}/{path}?token={}&expires_in={}",
            new_id(),
            expires_in.as_secs()
        ))
    }
}
