//! Customer records: account signup, find-or-create on order intake, and
//! profile updates.
//!
//! A customer row is unique per auth user (`user_id`) and, for guests, per
//! phone/email. Signup creates the auth user first and then upserts the
//! customer row; the hosted auth service can take a moment before a fresh
//! user is visible to the foreign key, so that upsert is retried on `23503`
//! with a fixed delay. If the upsert ultimately fails, an auth user created by
//! this request is deleted again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{debug, error, info, warn};

use crate::backend::{
    AdminUserAttributes, Backend, BackendError, ClienteRow, ClienteUpsert, EnsureClienteArgs,
    TermsAcceptance, UserMetadata,
};
use crate::error::StoreError;
use crate::legal::TermsSnapshot;

const DUPLICATE_EMAIL_MESSAGE: &str = "Já existe uma conta cadastrada com este e-mail.";
const MIN_PASSWORD_LEN: usize = 6;
const MIN_PHONE_DIGITS: usize = 10;
const CPF_DIGITS: usize = 11;
const MIN_CEP_DIGITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(200),
        }
    }
}

/// Signup form. Non-string values are treated as missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub telefone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub endereco: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cidade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cep: Option<String>,
    #[serde(default)]
    pub aceite_termos: serde_json::Value,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidSignup {
    email: String,
    password: String,
    nome: String,
    telefone_original: String,
    telefone: String,
    cpf: Option<String>,
    endereco: String,
    cidade: String,
    cep: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCustomer {
    pub user_id: String,
    pub cliente_id: String,
    pub new_user: bool,
}

pub fn digits_only(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn validate_signup(request: &SignupRequest) -> Result<ValidSignup, StoreError> {
    if request.aceite_termos != serde_json::Value::Bool(true) {
        return Err(StoreError::invalid("Aceite os termos para continuar."));
    }

    let email = trimmed(request.email.as_deref()).to_lowercase();
    let password = request.password.clone().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(StoreError::invalid("E-mail e senha são obrigatórios."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::invalid(
            "A senha deve ter pelo menos 6 caracteres.",
        ));
    }

    let nome = trimmed(request.nome.as_deref());
    if nome.is_empty() {
        return Err(StoreError::invalid("Informe seu nome completo."));
    }

    let telefone_original = trimmed(request.telefone.as_deref());
    let telefone = digits_only(Some(&telefone_original));
    if telefone.len() < MIN_PHONE_DIGITS {
        return Err(StoreError::invalid("Informe um telefone válido."));
    }

    let cpf = digits_only(request.cpf.as_deref());
    if !cpf.is_empty() && cpf.len() != CPF_DIGITS {
        return Err(StoreError::invalid("Informe um CPF válido."));
    }

    let endereco = trimmed(request.endereco.as_deref());
    if endereco.is_empty() {
        return Err(StoreError::invalid("Informe o endereço completo."));
    }

    let cidade = trimmed(request.cidade.as_deref());
    if cidade.is_empty() {
        return Err(StoreError::invalid("Informe a cidade."));
    }

    let cep = digits_only(request.cep.as_deref());
    if cep.len() < MIN_CEP_DIGITS {
        return Err(StoreError::invalid("Informe um CEP válido."));
    }

    Ok(ValidSignup {
        email,
        password,
        nome,
        telefone_original,
        telefone,
        cpf: (!cpf.is_empty()).then_some(cpf),
        endereco,
        cidade,
        cep,
    })
}

/// Translate an auth/database failure message into the customer-facing error.
pub fn map_signup_error(message: Option<&str>) -> StoreError {
    let Some(message) = message.filter(|m| !m.is_empty()) else {
        return StoreError::Internal(String::from("Erro ao criar conta."));
    };
    let lower = message.to_lowercase();

    if lower.contains("already exists")
        || lower.contains("already registered")
        || lower.contains("already been registered")
        || lower.contains("duplicate")
    {
        return StoreError::Conflict(String::from(DUPLICATE_EMAIL_MESSAGE));
    }
    if lower.contains("violates foreign key constraint") {
        return StoreError::Conflict(String::from(
            "Não foi possível vincular o usuário ao cadastro. Tente novamente em instantes.",
        ));
    }
    if lower.contains("database error creating new user") {
        return StoreError::Internal(String::from("Erro interno ao criar o usuário."));
    }
    if lower.contains("password") {
        return StoreError::invalid("A senha informada não atende aos requisitos.");
    }
    if lower.contains("invalid email") {
        return StoreError::invalid("Informe um e-mail válido.");
    }
    StoreError::Invalid(message.to_string())
}

fn map_signup_backend_error(err: BackendError) -> StoreError {
    if err.is_not_configured() {
        return StoreError::Backend(err);
    }
    map_signup_error(Some(&err.to_string()))
}

/// Upsert a customer row, retrying foreign key violations per `retry`.
pub async fn upsert_with_retry(
    backend: &dyn Backend,
    upsert: &ClienteUpsert,
    retry: RetryPolicy,
) -> Result<ClienteRow, BackendError> {
    let mut attempts = 0;
    loop {
        match backend.upsert_cliente(upsert).await {
            Ok(row) => return Ok(row),
            Err(err) if err.is_foreign_key_violation() && attempts < retry.attempts => {
                attempts += 1;
                warn!(
                    user_id = %upsert.user_id,
                    attempt = attempts,
                    max_attempts = retry.attempts,
                    "customer upsert raced auth user creation; retrying"
                );
                tokio::time::sleep(retry.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

pub async fn register_customer(
    backend: &dyn Backend,
    request: &SignupRequest,
    retry: RetryPolicy,
) -> Result<RegisteredCustomer, StoreError> {
    let signup = validate_signup(request)?;
    let terms = TermsSnapshot::current();
    let accepted_at = Utc::now();

    let metadata = UserMetadata {
        nome: signup.nome.clone(),
        telefone: if signup.telefone_original.is_empty() {
            signup.telefone.clone()
        } else {
            signup.telefone_original.clone()
        },
    };

    let existing = match backend.auth_user_id_by_email(&signup.email).await {
        Ok(id) => id,
        Err(err) => {
            error!(error = %err, "auth user lookup by email failed");
            None
        }
    };
    let new_user = existing.is_none();

    let user_id = match existing {
        Some(user_id) => {
            backend
                .admin_update_user(
                    &user_id,
                    &AdminUserAttributes {
                        email: None,
                        password: signup.password.clone(),
                        email_confirm: true,
                        user_metadata: metadata,
                    },
                )
                .await
                .map_err(map_signup_backend_error)?;
            debug!(user_id = %user_id, "existing auth user updated for signup");
            user_id
        }
        None => {
            let created = backend
                .admin_create_user(&AdminUserAttributes {
                    email: Some(signup.email.clone()),
                    password: signup.password.clone(),
                    email_confirm: true,
                    user_metadata: metadata,
                })
                .await
                .map_err(map_signup_backend_error)?;
            debug!(user_id = %created.id, "auth user created for signup");
            created.id
        }
    };

    let upsert = ClienteUpsert {
        user_id: user_id.clone(),
        nome: Some(signup.nome),
        email: Some(signup.email),
        telefone: Some(signup.telefone),
        cpf: signup.cpf,
        endereco: Some(signup.endereco),
        cidade: Some(signup.cidade),
        cep: Some(signup.cep),
        aceite_termos: Some(true),
        hash_termos: Some(terms.customer_marker()),
        data_aceite: Some(accepted_at),
    };

    let cliente = match upsert_with_retry(backend, &upsert, retry).await {
        Ok(cliente) => cliente,
        Err(err) => {
            error!(user_id = %user_id, error = %err, "customer upsert failed during signup");
            if new_user {
                if let Err(rollback) = backend.admin_delete_user(&user_id).await {
                    error!(
                        user_id = %user_id,
                        error = %rollback,
                        "failed to roll back auth user after customer upsert error"
                    );
                }
            }
            return Err(map_signup_backend_error(err));
        }
    };

    backend
        .upsert_terms_acceptance(&TermsAcceptance {
            cliente_id: cliente.id.clone(),
            versao_termos: terms.version.to_string(),
            hash_termos: terms.hash.clone(),
            data_aceite: accepted_at,
            aceitou_lgpd: true,
        })
        .await
        .map_err(|err| {
            error!(cliente_id = %cliente.id, error = %err, "failed to persist terms acceptance on signup");
            StoreError::Internal(String::from(
                "Nao foi possivel registrar o aceite dos termos.",
            ))
        })?;

    info!(user_id = %user_id, cliente_id = %cliente.id, new_user, "customer registered");
    Ok(RegisteredCustomer {
        user_id,
        cliente_id: cliente.id,
        new_user,
    })
}

/// Contact details collected on order forms. `telefone` is already normalized.
#[derive(Debug, Clone)]
pub struct CustomerContact {
    pub nome: String,
    pub email: Option<String>,
    pub telefone: String,
    pub cpf: Option<String>,
    pub endereco: String,
    pub cidade: Option<String>,
    pub cep: Option<String>,
}

/// Find-or-create the customer behind an order and record terms acceptance.
pub async fn ensure_customer_with_terms(
    backend: &dyn Backend,
    contact: &CustomerContact,
    client_ip: Option<String>,
    accepted_at: DateTime<Utc>,
) -> Result<String, StoreError> {
    let terms = TermsSnapshot::current();
    let reported = backend
        .ensure_cliente_with_terms(&EnsureClienteArgs {
            email: contact.email.clone(),
            phone: contact.telefone.clone(),
            nome: contact.nome.clone(),
            cpf: contact.cpf.clone(),
            endereco: contact.endereco.clone(),
            cidade: contact.cidade.clone(),
            cep: contact.cep.clone(),
            terms_version: terms.version.to_string(),
            terms_hash: terms.hash,
            terms_acceptance: accepted_at,
            terms_ip: client_ip,
        })
        .await?;

    let cliente_id = match reported {
        Some(id) => Some(id),
        None => {
            debug!(phone = %contact.telefone, "procedure returned no id; looking customer up");
            match backend
                .find_cliente_by_contact(&contact.telefone, contact.email.as_deref())
                .await
            {
                Ok(row) => row.map(|row| row.id),
                Err(err) if err.is_not_single_row() => {
                    warn!(phone = %contact.telefone, "several customers share this contact");
                    None
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    cliente_id.ok_or_else(|| StoreError::invalid("Nao foi possivel identificar o cliente."))
}

/// Profile fields a signed-in customer may change.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub cpf: Option<String>,
    pub endereco: Option<String>,
    pub cidade: Option<String>,
    pub cep: Option<String>,
}

pub async fn update_customer(
    backend: &dyn Backend,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<ClienteRow, StoreError> {
    let clean = |value: Option<String>| value.map(|v| v.trim().to_string());
    let upsert = ClienteUpsert {
        user_id: user_id.to_string(),
        nome: clean(update.nome),
        email: clean(update.email).map(|email| email.to_lowercase()),
        telefone: update.telefone.map(|t| digits_only(Some(&t))),
        cpf: update.cpf.map(|c| digits_only(Some(&c))),
        endereco: clean(update.endereco),
        cidade: clean(update.cidade),
        cep: update.cep.map(|c| digits_only(Some(&c))),
        ..Default::default()
    };
    let row = backend.upsert_cliente(&upsert).await?;
    info!(user_id, cliente_id = %row.id, "customer profile updated");
    Ok(row)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crate::legal::TermsSnapshot;

    const FAST: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(1),
    };

    fn signup(overrides: serde_json::Value) -> SignupRequest {
        let mut base = json!({
            "email": "  Ana@Example.com ",
            "password": "segredo1",
            "nome": " Ana Souza ",
            "telefone": "(51) 99999-0000",
            "cpf": "123.456.789-01",
            "endereco": "Rua A, 10",
            "cidade": "Porto Alegre",
            "cep": "90000-000",
            "aceiteTermos": true
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    fn invalid_message(request: SignupRequest) -> String {
        match validate_signup(&request) {
            Err(StoreError::Invalid(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validation_messages_follow_field_order() {
        assert_eq!(
            invalid_message(signup(json!({ "aceiteTermos": "true" }))),
            "Aceite os termos para continuar."
        );
        assert_eq!(
            invalid_message(signup(json!({ "email": 42 }))),
            "E-mail e senha são obrigatórios."
        );
        assert_eq!(
            invalid_message(signup(json!({ "password": "12345" }))),
            "A senha deve ter pelo menos 6 caracteres."
        );
        assert_eq!(
            invalid_message(signup(json!({ "nome": "   " }))),
            "Informe seu nome completo."
        );
        assert_eq!(
            invalid_message(signup(json!({ "telefone": "999-000" }))),
            "Informe um telefone válido."
        );
        assert_eq!(
            invalid_message(signup(json!({ "cpf": "123" }))),
            "Informe um CPF válido."
        );
        assert_eq!(
            invalid_message(signup(json!({ "endereco": "" }))),
            "Informe o endereço completo."
        );
        assert_eq!(
            invalid_message(signup(json!({ "cidade": null }))),
            "Informe a cidade."
        );
        assert_eq!(
            invalid_message(signup(json!({ "cep": "9000" }))),
            "Informe um CEP válido."
        );
    }

    #[test]
    fn validation_normalizes_fields() {
        let valid = validate_signup(&signup(json!({ "cpf": "" }))).unwrap();
        assert_eq!(valid.email, "ana@example.com");
        assert_eq!(valid.nome, "Ana Souza");
        assert_eq!(valid.telefone, "51999990000");
        assert_eq!(valid.telefone_original, "(51) 99999-0000");
        assert_eq!(valid.cpf, None);
        assert_eq!(valid.cep, "90000000");
    }

    #[test]
    fn signup_error_mapping() {
        assert!(matches!(
            map_signup_error(Some("User already registered")),
            StoreError::Conflict(m) if m == DUPLICATE_EMAIL_MESSAGE
        ));
        assert!(matches!(
            map_signup_error(Some("insert violates foreign key constraint x")),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            map_signup_error(Some("Database error creating new user")),
            StoreError::Internal(_)
        ));
        assert!(matches!(
            map_signup_error(Some("Password should be at least 6 characters")),
            StoreError::Invalid(m) if m == "A senha informada não atende aos requisitos."
        ));
        assert!(matches!(
            map_signup_error(Some("Invalid email format")),
            StoreError::Invalid(m) if m == "Informe um e-mail válido."
        ));
        assert!(matches!(
            map_signup_error(Some("something odd")),
            StoreError::Invalid(m) if m == "something odd"
        ));
        assert!(matches!(map_signup_error(None), StoreError::Internal(_)));
    }

    #[tokio::test]
    async fn register_creates_user_customer_and_terms() -> Result<()> {
        let backend = MemoryBackend::new();
        let registered = register_customer(&backend, &signup(json!({})), FAST).await?;
        assert!(registered.new_user);

        let cliente = backend
            .find_cliente_by_user_id(&registered.user_id)
            .await?
            .unwrap();
        assert_eq!(cliente.id, registered.cliente_id);
        assert_eq!(cliente.email.as_deref(), Some("ana@example.com"));
        assert_eq!(cliente.cpf.as_deref(), Some("12345678901"));
        assert_eq!(cliente.aceite_termos, Some(true));
        assert_eq!(
            cliente.hash_termos,
            Some(TermsSnapshot::current().customer_marker())
        );

        let terms = backend.terms_for(&cliente.id).await.unwrap();
        assert!(terms.aceitou_lgpd);
        assert_eq!(terms.hash_termos, TermsSnapshot::current().hash);
        Ok(())
    }

    #[tokio::test]
    async fn register_twice_reuses_auth_user_and_customer_row() -> Result<()> {
        let backend = MemoryBackend::new();
        let first = register_customer(&backend, &signup(json!({})), FAST).await?;
        let second = register_customer(
            &backend,
            &signup(json!({ "password": "outrasenha", "cidade": "Canoas" })),
            FAST,
        )
        .await?;
        assert!(!second.new_user);
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.cliente_id, second.cliente_id);
        assert_eq!(backend.user_count().await, 1);
        assert_eq!(backend.clientes().await.len(), 1);
        assert!(backend
            .sign_in_with_password("ana@example.com", "outrasenha")
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn foreign_key_race_is_retried() -> Result<()> {
        let backend = MemoryBackend::new();
        backend.fail_next_upserts_with_foreign_key(3).await;
        let registered = register_customer(&backend, &signup(json!({})), FAST).await?;
        assert!(backend
            .find_cliente_by_user_id(&registered.user_id)
            .await?
            .is_some());
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_retries_roll_back_new_user() -> Result<()> {
        let backend = MemoryBackend::new();
        backend.fail_next_upserts_with_foreign_key(6).await;
        let err = register_customer(&backend, &signup(json!({})), FAST)
            .await
            .err();
        assert!(matches!(
            err,
            Some(StoreError::Conflict(m)) if m.starts_with("Não foi possível vincular")
        ));
        assert_eq!(backend.user_count().await, 0);
        assert!(backend.clientes().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failure_keeps_pre_existing_user() -> Result<()> {
        let backend = MemoryBackend::new();
        register_customer(&backend, &signup(json!({})), FAST).await?;
        backend.fail_next_upserts_with_foreign_key(6).await;
        assert!(register_customer(&backend, &signup(json!({})), FAST)
            .await
            .is_err());
        assert_eq!(backend.user_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn retry_counts_attempts() -> Result<()> {
        let backend = MemoryBackend::new();
        let user = backend
            .admin_create_user(&AdminUserAttributes {
                email: Some(String::from("x@y.com")),
                password: String::from("secret1"),
                email_confirm: true,
                user_metadata: UserMetadata {
                    nome: String::from("X"),
                    telefone: String::from("5100000000"),
                },
            })
            .await?;
        let upsert = ClienteUpsert {
            user_id: user.id,
            ..Default::default()
        };

        backend.fail_next_upserts_with_foreign_key(2).await;
        let policy = RetryPolicy {
            attempts: 1,
            delay: Duration::from_millis(1),
        };
        let err = upsert_with_retry(&backend, &upsert, policy).await.err();
        assert!(err.is_some_and(|e| e.is_foreign_key_violation()));
        assert!(upsert_with_retry(&backend, &upsert, policy).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_customer_is_idempotent_per_contact() -> Result<()> {
        let backend = MemoryBackend::new();
        let contact = CustomerContact {
            nome: String::from("Bruno"),
            email: Some(String::from("bruno@x.com")),
            telefone: String::from("51988887777"),
            cpf: None,
            endereco: String::from("Av. B, 20"),
            cidade: None,
            cep: None,
        };
        let first = ensure_customer_with_terms(&backend, &contact, None, Utc::now()).await?;
        let second = ensure_customer_with_terms(
            &backend,
            &CustomerContact {
                email: None,
                ..contact.clone()
            },
            Some(String::from("10.0.0.1")),
            Utc::now(),
        )
        .await?;
        assert_eq!(first, second);
        assert_eq!(backend.clientes().await.len(), 1);
        Ok(())
    }

    fn walk_in_contact() -> CustomerContact {
        CustomerContact {
            nome: String::from("Ana Souza"),
            email: None,
            telefone: String::from("51999990000"),
            cpf: None,
            endereco: String::from("Rua A, 10"),
            cidade: None,
            cep: None,
        }
    }

    #[tokio::test]
    async fn ensure_falls_back_to_contact_lookup_when_no_id_is_reported() -> Result<()> {
        let backend = MemoryBackend::new();
        let created = ensure_customer_with_terms(&backend, &walk_in_contact(), None, Utc::now()).await?;

        backend.miss_next_ensures(1).await;
        let found = ensure_customer_with_terms(&backend, &walk_in_contact(), None, Utc::now()).await?;
        assert_eq!(found, created);
        assert_eq!(backend.clientes().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_without_reported_id_or_match_is_rejected() -> Result<()> {
        let backend = MemoryBackend::new();
        backend.miss_next_ensures(1).await;
        let err = ensure_customer_with_terms(&backend, &walk_in_contact(), None, Utc::now())
            .await
            .err();
        assert!(
            matches!(err, Some(StoreError::Invalid(msg)) if msg == "Nao foi possivel identificar o cliente.")
        );
        assert!(backend.clientes().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_with_ambiguous_contact_is_rejected() -> Result<()> {
        let backend = MemoryBackend::new();
        register_customer(&backend, &signup(json!({})), FAST).await?;
        register_customer(&backend, &signup(json!({ "email": "bia@example.com" })), FAST).await?;
        assert_eq!(backend.clientes().await.len(), 2);

        backend.miss_next_ensures(1).await;
        let err = ensure_customer_with_terms(&backend, &walk_in_contact(), None, Utc::now())
            .await
            .err();
        assert!(
            matches!(err, Some(StoreError::Invalid(msg)) if msg == "Nao foi possivel identificar o cliente.")
        );
        Ok(())
    }

    #[tokio::test]
    async fn profile_update_requires_auth_user() -> Result<()> {
        let backend = MemoryBackend::new();
        let err = update_customer(&backend, "nobody", ProfileUpdate::default())
            .await
            .err();
        assert!(matches!(err, Some(StoreError::Backend(e)) if e.is_foreign_key_violation()));

        let registered = register_customer(&backend, &signup(json!({})), FAST).await?;
        let row = update_customer(
            &backend,
            &registered.user_id,
            ProfileUpdate {
                telefone: Some(String::from("(51) 3333-4444")),
                cidade: Some(String::from(" Gravataí ")),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(row.telefone.as_deref(), Some("5133334444"));
        assert_eq!(row.cidade.as_deref(), Some("Gravataí"));
        assert_eq!(row.nome.as_deref(), Some("Ana Souza"));
        Ok(())
    }
}
