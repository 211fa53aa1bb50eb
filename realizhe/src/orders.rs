//! Order intake: standard orders and custom meal plans.
//!
//! Both flows resolve the customer (find-or-create with terms acceptance),
//! persist the submission and answer with a prefilled WhatsApp link. A custom
//! plan may carry an attachment as a base64 data URL; it is stored under the
//! customer's folder in the custom-plan bucket before the plan row is written.

use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine as _;
use bytes::Bytes;
use chrono::Utc;
use futures_util::future::try_join;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{
    Backend, CustomPlanDetails, NewPedido, NewPedidoPersonalizado, OrderItem,
    PedidoPersonalizadoRow, PedidoRow,
};
use crate::config::{AppConfig, WhatsappConfig};
use crate::customers::{ensure_customer_with_terms, CustomerContact};
use crate::error::StoreError;
use crate::whatsapp::{
    build_custom_plan_message, build_standard_order_message, normalize_phone, whatsapp_url,
    MessageContact, MessageItem,
};

const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);
const FALLBACK_MIME: &str = "application/octet-stream";
const DEFAULT_FILE_NAME: &str = "arquivo";

static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(.*?);base64,(.*)$")
        .unwrap_or_else(|e| panic!("data url regex must be valid: {e}"))
});

/// Where submissions are routed and stored.
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    pub whatsapp: WhatsappConfig,
    pub custom_plan_bucket: String,
    pub custom_plan_bucket_public: bool,
}

impl SubmissionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            whatsapp: config.whatsapp.clone(),
            custom_plan_bucket: config.supabase.custom_plan_bucket.clone(),
            custom_plan_bucket_public: config.supabase.custom_plan_bucket_public,
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            whatsapp: WhatsappConfig::default(),
            custom_plan_bucket: String::from("planos-personalizados"),
            custom_plan_bucket_public: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomerPayload {
    pub nome: String,
    pub email: Option<String>,
    pub telefone: String,
    pub cpf: Option<String>,
    pub endereco: String,
    pub cidade: Option<String>,
    pub cep: Option<String>,
    pub forma_pagamento: String,
}

impl CustomerPayload {
    fn is_complete(&self) -> bool {
        !self.nome.trim().is_empty()
            && !self.telefone.trim().is_empty()
            && !self.endereco.trim().is_empty()
    }

    fn contact(&self) -> CustomerContact {
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        CustomerContact {
            nome: self.nome.trim().to_string(),
            email: optional(&self.email).map(|email| email.to_lowercase()),
            telefone: normalize_phone(&self.telefone),
            cpf: optional(&self.cpf),
            endereco: self.endereco.trim().to_string(),
            cidade: optional(&self.cidade),
            cep: optional(&self.cep),
        }
    }

    /// `phone` is the normalized digits-only number.
    fn message_contact<'a>(&'a self, phone: &'a str, total: Option<f64>) -> MessageContact<'a> {
        MessageContact {
            customer_name: self.nome.trim(),
            address: self.endereco.trim(),
            city: self.cidade.as_deref().map(str::trim),
            phone,
            payment: self.forma_pagamento.trim(),
            total,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderPayload {
    pub tipo: String,
    pub itens: Vec<OrderItem>,
    pub valor_total: Option<f64>,
    pub observacoes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer: CustomerPayload,
    pub order: OrderPayload,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentPayload {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanPayload {
    pub frequencia: String,
    pub preferencias: Vec<String>,
    pub objetivos: String,
    pub observacoes: Option<String>,
    pub valor_estimado: Option<f64>,
    pub arquivo_plano: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomPlanRequest {
    pub customer: CustomerPayload,
    pub plano: PlanPayload,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub whatsapp_url: String,
    pub cliente_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MyOrders {
    pub pedidos: Vec<PedidoRow>,
    pub personalizados: Vec<PedidoPersonalizadoRow>,
}

/// Decoded attachment ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttachment {
    pub bytes: Bytes,
    pub content_type: String,
    pub extension: String,
}

fn check_common(terms_accepted: bool, customer: &CustomerPayload) -> Result<(), StoreError> {
    if !terms_accepted {
        return Err(StoreError::invalid("Aceite dos termos obrigatorio."));
    }
    if !customer.is_complete() {
        return Err(StoreError::invalid("Dados do cliente incompletos."));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub async fn submit_order(
    backend: &dyn Backend,
    settings: &SubmissionSettings,
    request: &OrderRequest,
    client_ip: Option<String>,
) -> Result<Submitted, StoreError> {
    check_common(request.terms_accepted, &request.customer)?;
    if request.order.itens.is_empty() {
        return Err(StoreError::invalid("Nenhum item informado."));
    }

    let contact = request.customer.contact();
    let cliente_id = ensure_customer_with_terms(backend, &contact, client_ip, Utc::now()).await?;

    let tipo = non_empty(Some(&request.order.tipo)).unwrap_or_else(|| String::from("padrao"));
    backend
        .insert_pedido(&NewPedido {
            cliente_id: cliente_id.clone(),
            tipo_pedido: tipo,
            itens: request.order.itens.clone(),
            valor_total: request.order.valor_total,
            forma_pagamento: request.customer.forma_pagamento.trim().to_string(),
            observacoes: non_empty(request.order.observacoes.as_deref()),
        })
        .await?;

    let items = request
        .order
        .itens
        .iter()
        .map(|item| MessageItem {
            name: &item.name,
            quantity: item.quantity,
        })
        .collect::<Vec<_>>();
    let phone = normalize_phone(&request.customer.telefone);
    let message = build_standard_order_message(
        &request.customer.message_contact(&phone, request.order.valor_total),
        &items,
    );

    info!(cliente_id = %cliente_id, items = items.len(), "order registered");
    Ok(Submitted {
        whatsapp_url: whatsapp_url(&settings.whatsapp.orders_number, &message),
        cliente_id,
    })
}

/// Decode a `data:<mime>;base64,<payload>` attachment. Values that are not a
/// data URL are read as bare base64.
pub fn parse_attachment(file: &AttachmentPayload) -> Result<ParsedAttachment, StoreError> {
    let raw = file.data.trim();
    let (data_mime, payload) = match DATA_URL_RE.captures(raw) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, raw),
    };

    let compact = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect::<String>();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| {
            warn!(error = %err, "custom plan attachment is not valid base64");
            StoreError::invalid("Arquivo do plano invalido.")
        })?;

    // A name without a dot is taken whole as its own extension.
    let name = non_empty(file.name.as_deref()).unwrap_or_else(|| String::from(DEFAULT_FILE_NAME));
    let extension = name
        .rsplit('.')
        .next()
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_FILE_NAME));

    let content_type = data_mime
        .filter(|mime| !mime.is_empty())
        .or_else(|| non_empty(file.mime_type.as_deref()))
        .or_else(|| {
            mime_guess::from_ext(&extension)
                .first_raw()
                .map(String::from)
        })
        .unwrap_or_else(|| String::from(FALLBACK_MIME));

    Ok(ParsedAttachment {
        bytes: Bytes::from(bytes),
        content_type,
        extension,
    })
}

/// Object key for an attachment: `<cliente>/<millis>-<uuid>.<ext>`.
pub fn attachment_path(cliente_id: &str, millis: i64, extension: &str) -> String {
    format!(
        "{cliente_id}/{millis}-{}.{extension}",
        uuid::Uuid::new_v4()
    )
}

async fn store_attachment(
    backend: &dyn Backend,
    settings: &SubmissionSettings,
    cliente_id: &str,
    attachment: ParsedAttachment,
) -> Result<String, StoreError> {
    let path = attachment_path(
        cliente_id,
        Utc::now().timestamp_millis(),
        &attachment.extension,
    );
    let bucket = settings.custom_plan_bucket.as_str();
    backend
        .upload_object(bucket, &path, attachment.bytes, &attachment.content_type)
        .await?;

    if settings.custom_plan_bucket_public {
        Ok(backend.public_object_url(bucket, &path))
    } else {
        Ok(backend
            .create_signed_url(bucket, &path, SIGNED_URL_TTL)
            .await?)
    }
}

/// Plain-text plan summary carried in the WhatsApp message.
pub fn plan_summary(plan: &PlanPayload) -> String {
    let mut lines = vec![
        format!("Frequencia: {}", plan.frequencia.trim()),
        format!("Preferencias: {}", plan.preferencias.join(", ")),
        format!("Objetivos: {}", plan.objetivos.trim()),
    ];
    if let Some(notes) = non_empty(plan.observacoes.as_deref()) {
        lines.push(format!("Observacoes: {notes}"));
    }
    lines.join("\n")
}

pub async fn submit_custom_plan(
    backend: &dyn Backend,
    settings: &SubmissionSettings,
    request: &CustomPlanRequest,
    client_ip: Option<String>,
) -> Result<Submitted, StoreError> {
    check_common(request.terms_accepted, &request.customer)?;
    let plan = &request.plano;

    // Decode before touching the backend so a bad file leaves nothing behind.
    let attachment = plan
        .arquivo_plano
        .as_ref()
        .filter(|file| !file.data.trim().is_empty())
        .map(parse_attachment)
        .transpose()?;

    let contact = request.customer.contact();
    let cliente_id = ensure_customer_with_terms(backend, &contact, client_ip, Utc::now()).await?;

    let attachment_url = match attachment {
        Some(attachment) => {
            Some(store_attachment(backend, settings, &cliente_id, attachment).await?)
        }
        None => None,
    };

    backend
        .insert_pedido_personalizado(&NewPedidoPersonalizado {
            cliente_id: cliente_id.clone(),
            plano: CustomPlanDetails {
                preferencias: plan.preferencias.clone(),
                objetivos: plan.objetivos.trim().to_string(),
            },
            frequencia: plan.frequencia.trim().to_string(),
            forma_pagamento: request.customer.forma_pagamento.trim().to_string(),
            valor_estimado: plan.valor_estimado,
            observacoes: non_empty(plan.observacoes.as_deref()),
            arquivo_plano: attachment_url.clone(),
        })
        .await?;

    let phone = normalize_phone(&request.customer.telefone);
    let message = build_custom_plan_message(
        &request.customer.message_contact(&phone, plan.valor_estimado),
        &plan_summary(plan),
        attachment_url.as_deref(),
    );

    info!(
        cliente_id = %cliente_id,
        attachment = attachment_url.is_some(),
        "custom plan registered"
    );
    Ok(Submitted {
        whatsapp_url: whatsapp_url(&settings.whatsapp.custom_plans_number, &message),
        cliente_id,
    })
}

/// Orders and custom plans of the signed-in customer, newest first.
pub async fn list_my_orders(backend: &dyn Backend, user_id: &str) -> Result<MyOrders, StoreError> {
    let Some(cliente) = backend.find_cliente_by_user_id(user_id).await? else {
        return Ok(MyOrders::default());
    };

    let (pedidos, personalizados) = try_join(
        backend.list_pedidos(&cliente.id),
        backend.list_pedidos_personalizados(&cliente.id),
    )
    .await?;

    Ok(MyOrders {
        pedidos,
        personalizados,
    })
}
