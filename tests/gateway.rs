use product_advisor::api::models::{CompareRequest, RecommendRequest};
use product_advisor::gateway::*;

fn compare(urls: &[&str], context: Option<&str>) -> Result<AnalysisRequest, ValidationError> {
    validate_compare(
        CompareRequest {
            urls: Some(urls.iter().map(|u| u.to_string()).collect()),
            context: context.map(str::to_string),
        },
        &Limits::default(),
    )
}

fn recommend(product_type: &str, min: &str, max: &str, main_use: &str) -> RecommendRequest {
    RecommendRequest {
        product_type: Some(product_type.to_string()),
        min_budget: min.to_string(),
        max_budget: max.to_string(),
        main_use: Some(main_use.to_string()),
        specific_needs: None,
    }
}

#[cfg(test)]
mod compare_validation {
    use super::*;

    #[test]
    fn test_two_valid_urls() {
        let request = compare(&["https://a.com/x", "https://b.com/y"], None).unwrap();
        assert_eq!(
            request,
            AnalysisRequest::Compare {
                urls: vec!["https://a.com/x".into(), "https://b.com/y".into()],
                context: None,
            }
        );
        assert_eq!(request.mode(), Mode::Compare);
    }

    #[test]
    fn test_missing_urls() {
        let result = validate_compare(CompareRequest::default(), &Limits::default());
        assert_eq!(result, Err(ValidationError::MissingUrls));
    }

    #[test]
    fn test_url_count_bounds() {
        assert_eq!(
            compare(&[], None),
            Err(ValidationError::TooFewUrls { min: 2, got: 0 })
        );
        assert_eq!(
            compare(&["https://a.com"], None),
            Err(ValidationError::TooFewUrls { min: 2, got: 1 })
        );
        let six = ["https://a.com"; 6];
        assert_eq!(
            compare(&six, None),
            Err(ValidationError::TooManyUrls { max: 5, got: 6 })
        );
        assert!(compare(&["https://a.com"; 5], None).is_ok());
    }

    #[test]
    fn test_duplicates_are_allowed() {
        assert!(compare(&["https://a.com/x", "https://a.com/x"], None).is_ok());
    }

    #[test]
    fn test_invalid_urls() {
        assert_eq!(
            compare(&["https://a.com", "not a url"], None),
            Err(ValidationError::InvalidUrl("not a url".into()))
        );
        assert!(matches!(
            compare(&["https://a.com", "javascript:alert(1)"], None),
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_urls_are_trimmed_not_normalized() {
        let request = compare(&["  https://a.com ", "https://b.com/p?q=1"], None).unwrap();
        let AnalysisRequest::Compare { urls, .. } = request else {
            panic!("expected compare request");
        };
        assert_eq!(urls, vec!["https://a.com", "https://b.com/p?q=1"]);
    }

    #[test]
    fn test_context_limits() {
        let urls = ["https://a.com", "https://b.com"];
        let at_limit = "x".repeat(500);
        assert!(compare(&urls, Some(&at_limit)).is_ok());

        let over = "x".repeat(501);
        assert_eq!(
            compare(&urls, Some(&over)),
            Err(ValidationError::ContextTooLong { max: 500, got: 501 })
        );

        // counted in characters, not bytes
        let accented = "é".repeat(500);
        assert!(compare(&urls, Some(&accented)).is_ok());
    }

    #[test]
    fn test_blank_context_is_dropped() {
        let request = compare(&["https://a.com", "https://b.com"], Some("   ")).unwrap();
        assert!(matches!(request, AnalysisRequest::Compare { context: None, .. }));
    }

    #[test]
    fn test_custom_limits() {
        let limits = Limits {
            min_urls: 1,
            max_urls: 2,
            max_context_chars: 10,
        };
        let request = CompareRequest {
            urls: Some(vec!["https://a.com".into()]),
            context: None,
        };
        assert!(validate_compare(request, &limits).is_ok());
    }
}

#[cfg(test)]
mod recommend_validation {
    use super::*;

    #[test]
    fn test_complete_request() {
        let mut req = recommend("laptop", "500", "1000", "gaming");
        req.specific_needs = Some(" light ".into());
        let request = validate_recommend(req).unwrap();
        assert_eq!(
            request,
            AnalysisRequest::Recommend(Recommendation {
                product_type: "laptop".into(),
                min_budget: "500".into(),
                max_budget: "1000".into(),
                main_use: "gaming".into(),
                specific_needs: Some("light".into()),
            })
        );
        assert_eq!(request.mode(), Mode::Recommend);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            validate_recommend(recommend("", "500", "1000", "gaming")),
            Err(ValidationError::MissingField("productType"))
        );
        assert_eq!(
            validate_recommend(recommend("laptop", " ", "1000", "gaming")),
            Err(ValidationError::MissingField("minBudget"))
        );
        assert_eq!(
            validate_recommend(recommend("laptop", "500", "", "gaming")),
            Err(ValidationError::MissingField("maxBudget"))
        );
        assert_eq!(
            validate_recommend(recommend("laptop", "500", "1000", "")),
            Err(ValidationError::MissingField("mainUse"))
        );
        assert_eq!(
            validate_recommend(RecommendRequest::default()),
            Err(ValidationError::MissingField("productType"))
        );
    }

    #[test]
    fn test_budget_order() {
        assert_eq!(
            validate_recommend(recommend("tv", "900", "300", "movies")),
            Err(ValidationError::BudgetRange {
                min: "900".into(),
                max: "300".into()
            })
        );
        assert!(matches!(
            validate_recommend(recommend("tv", "-5", "300", "movies")),
            Err(ValidationError::NegativeBudget { .. })
        ));
    }

    #[test]
    fn test_free_text_budgets_pass_through() {
        assert!(validate_recommend(recommend("tv", "cheap", "around 1000€", "movies")).is_ok());
    }
}
