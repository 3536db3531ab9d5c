//! Data model for the submission engine.

pub mod application;
pub mod captcha;
pub mod form;
pub mod knowledge;
pub mod profile;

pub use application::{Application, ApplicationStatus, Batch};
pub use captcha::{CaptchaSession, CaptchaStatus, ChallengeInfo};
pub use form::{FieldKind, FormField, ScanOutcome, SubmitOutcome};
pub use knowledge::{AnswerSource, FieldAnswerCacheEntry, QaHistoryRecord, SiteFieldPattern};
pub use profile::{ProfileData, ProfileRecord};

/// Normalized host name of a job page URL, used to scope learned patterns.
pub fn site_domain(job_url: &str) -> Option<String> {
    let parsed = url::Url::parse(job_url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::site_domain;

    #[test]
    fn site_domain_strips_www_and_lowercases() {
        assert_eq!(
            site_domain("https://WWW.Jobs.Example.com/apply?id=1").as_deref(),
            Some("jobs.example.com")
        );
        assert_eq!(site_domain("not a url"), None);
    }
}
