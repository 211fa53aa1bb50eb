//! Row and payload shapes exchanged with the hosted backend. Column names
//! follow the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub preco: Option<f64>,
    #[serde(default)]
    pub imagem_path: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
    #[serde(default)]
    pub destaques: Option<Vec<String>>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClienteRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub endereco: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub aceite_termos: Option<bool>,
    #[serde(default)]
    pub hash_termos: Option<String>,
    #[serde(default)]
    pub data_aceite: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Upsert keyed on `user_id`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClienteUpsert {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aceite_termos: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_termos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_aceite: Option<DateTime<Utc>>,
}

/// Arguments of the `ensure_cliente_with_terms` procedure.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureClienteArgs {
    #[serde(rename = "p_email")]
    pub email: Option<String>,
    #[serde(rename = "p_phone")]
    pub phone: String,
    #[serde(rename = "p_nome")]
    pub nome: String,
    #[serde(rename = "p_cpf")]
    pub cpf: Option<String>,
    #[serde(rename = "p_endereco")]
    pub endereco: String,
    #[serde(rename = "p_cidade")]
    pub cidade: Option<String>,
    #[serde(rename = "p_cep")]
    pub cep: Option<String>,
    #[serde(rename = "p_terms_version")]
    pub terms_version: String,
    #[serde(rename = "p_terms_hash")]
    pub terms_hash: String,
    #[serde(rename = "p_terms_acceptance")]
    pub terms_acceptance: DateTime<Utc>,
    #[serde(rename = "p_terms_ip")]
    pub terms_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAcceptance {
    pub cliente_id: String,
    pub versao_termos: String,
    pub hash_termos: String,
    pub data_aceite: DateTime<Utc>,
    pub aceitou_lgpd: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPedido {
    pub cliente_id: String,
    pub tipo_pedido: String,
    pub itens: Vec<OrderItem>,
    pub valor_total: Option<f64>,
    pub forma_pagamento: String,
    pub observacoes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedidoRow {
    pub id: String,
    pub cliente_id: String,
    #[serde(default)]
    pub tipo_pedido: Option<String>,
    #[serde(default)]
    pub itens: serde_json::Value,
    #[serde(default)]
    pub valor_total: Option<f64>,
    #[serde(default)]
    pub forma_pagamento: Option<String>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub criado_em: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPlanDetails {
    pub preferencias: Vec<String>,
    pub objetivos: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPedidoPersonalizado {
    pub cliente_id: String,
    pub plano: CustomPlanDetails,
    pub frequencia: String,
    pub forma_pagamento: String,
    pub valor_estimado: Option<f64>,
    pub observacoes: Option<String>,
    pub arquivo_plano: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedidoPersonalizadoRow {
    pub id: String,
    pub cliente_id: String,
    #[serde(default)]
    pub plano: serde_json::Value,
    #[serde(default)]
    pub frequencia: Option<String>,
    #[serde(default)]
    pub forma_pagamento: Option<String>,
    #[serde(default)]
    pub valor_estimado: Option<f64>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub arquivo_plano: Option<String>,
    #[serde(default)]
    pub criado_em: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetadata {
    pub nome: String,
    pub telefone: String,
}

/// Admin create/update payload for auth users.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}
