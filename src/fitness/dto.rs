use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFitnessRequest {
    pub steps: i32,
    pub cups: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateFitnessRequest {
    pub steps: Option<i32>,
    pub cups: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub steps: Option<i32>,
    pub cups: Option<i32>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_sort")]
    pub sort: String,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

fn default_sort() -> String {
    "id".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_fill_defaults() {
        let params: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 20);
        assert_eq!(params.sort, "id");
        assert!(params.steps.is_none());
    }

    #[test]
    fn create_request_accepts_missing_date() {
        let req: CreateFitnessRequest =
            serde_json::from_str(r#"{"steps": 9000, "cups": 6}"#).unwrap();
        assert!(req.date.is_none());
    }

    #[test]
    fn create_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<CreateFitnessRequest>(
            r#"{"steps": 1, "cups": 1, "calories": 300}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }
}
