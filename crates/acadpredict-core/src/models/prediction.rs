use chrono::NaiveDateTime;
use serde::Deserialize;

/// A stored prediction from the history endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    #[serde(rename = "usuario_id")]
    pub user_id: Option<i64>,
    #[serde(rename = "promedio")]
    pub grade_average: f64,
    #[serde(rename = "asistencia")]
    pub attendance: f64,
    #[serde(rename = "horas_estudio")]
    pub study_hours: f64,
    #[serde(rename = "riesgo")]
    pub risk: String,
    pub score: f64,
    #[serde(rename = "modelo")]
    pub model: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(rename = "alerta_docente", default)]
    pub teacher_alert: Option<bool>,
}

impl PredictionRecord {
    pub fn is_high_risk(&self) -> bool {
        self.risk.eq_ignore_ascii_case("alto")
    }
}

/// Dashboard statistics from `/api/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    #[serde(rename = "total_usuarios", default)]
    pub total_users: u64,
    #[serde(rename = "total_predicciones", default)]
    pub total_predictions: u64,
    #[serde(rename = "riesgo_alto", default)]
    pub high_risk: u64,
    #[serde(rename = "riesgo_medio", default)]
    pub medium_risk: u64,
    #[serde(rename = "riesgo_bajo", default)]
    pub low_risk: u64,
    #[serde(rename = "score_promedio", default)]
    pub average_score: f64,
    #[serde(rename = "alertas_tempranas", default)]
    pub early_alerts: u64,
}
