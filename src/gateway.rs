use thiserror::Error;
use url::Url;

use crate::api::models::{CompareRequest, RecommendRequest};

/// Bounds applied to comparison requests.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_urls: usize,
    pub max_urls: usize,
    pub max_context_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            min_urls: 2,
            max_urls: 5,
            max_context_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compare,
    Recommend,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Compare => "compare",
            Mode::Recommend => "recommend",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub product_type: String,
    pub min_budget: String,
    pub max_budget: String,
    pub main_use: String,
    pub specific_needs: Option<String>,
}

/// A request that passed validation and may be handed to the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRequest {
    Compare {
        urls: Vec<String>,
        context: Option<String>,
    },
    Recommend(Recommendation),
}

impl AnalysisRequest {
    pub fn mode(&self) -> Mode {
        match self {
            AnalysisRequest::Compare { .. } => Mode::Compare,
            AnalysisRequest::Recommend(_) => Mode::Recommend,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("urls must be an array of product URLs")]
    MissingUrls,
    #[error("at least {min} product URLs are required, got {got}")]
    TooFewUrls { min: usize, got: usize },
    #[error("at most {max} product URLs are allowed, got {got}")]
    TooManyUrls { max: usize, got: usize },
    #[error("invalid product URL: {0:?}")]
    InvalidUrl(String),
    #[error("context must be at most {max} characters, got {got}")]
    ContextTooLong { max: usize, got: usize },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{field} must not be negative, got {value:?}")]
    NegativeBudget { field: &'static str, value: String },
    #[error("minBudget ({min}) cannot exceed maxBudget ({max})")]
    BudgetRange { min: String, max: String },
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

pub fn validate_compare(
    request: CompareRequest,
    limits: &Limits,
) -> Result<AnalysisRequest, ValidationError> {
    let urls = request.urls.ok_or(ValidationError::MissingUrls)?;

    if urls.len() < limits.min_urls {
        return Err(ValidationError::TooFewUrls {
            min: limits.min_urls,
            got: urls.len(),
        });
    }
    if urls.len() > limits.max_urls {
        return Err(ValidationError::TooManyUrls {
            max: limits.max_urls,
            got: urls.len(),
        });
    }

    let urls = urls
        .into_iter()
        .map(|raw| {
            let trimmed = raw.trim();
            match Url::parse(trimmed) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                    Ok(trimmed.to_string())
                }
                _ => Err(ValidationError::InvalidUrl(raw)),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let context = non_blank(request.context);
    if let Some(text) = &context {
        let got = text.chars().count();
        if got > limits.max_context_chars {
            return Err(ValidationError::ContextTooLong {
                max: limits.max_context_chars,
                got,
            });
        }
    }

    Ok(AnalysisRequest::Compare { urls, context })
}

pub fn validate_recommend(request: RecommendRequest) -> Result<AnalysisRequest, ValidationError> {
    let product_type = required(request.product_type, "productType")?;
    let min_budget = required(Some(request.min_budget), "minBudget")?;
    let max_budget = required(Some(request.max_budget), "maxBudget")?;
    let main_use = required(request.main_use, "mainUse")?;

    // Budgets stay free text for the analyzer; only numeric pairs are ordered.
    if let (Ok(min), Ok(max)) = (min_budget.parse::<f64>(), max_budget.parse::<f64>()) {
        if min < 0.0 {
            return Err(ValidationError::NegativeBudget {
                field: "minBudget",
                value: min_budget,
            });
        }
        if min > max {
            return Err(ValidationError::BudgetRange {
                min: min_budget,
                max: max_budget,
            });
        }
    }

    Ok(AnalysisRequest::Recommend(Recommendation {
        product_type,
        min_budget,
        max_budget,
        main_use,
        specific_needs: non_blank(request.specific_needs),
    }))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::MissingField(field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
