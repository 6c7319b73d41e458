use crate::models::Invoice;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `?as_of=YYYY-MM-DD`; defaults to today.
#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DueTemplatesResponse {
    pub as_of: NaiveDate,
    pub templates: Vec<Invoice>,
}
