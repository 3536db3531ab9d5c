use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored profile row: the structured answers a user registered up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub user_id: String,
    pub profile_name: String,
    pub data: ProfileData,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn new(user_id: &str, profile_name: &str, data: ProfileData) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            profile_name: profile_name.to_string(),
            data,
            created_at: Utc::now(),
        }
    }
}

/// Structured profile data, grouped the way application forms ask for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub personal: PersonalInfo,
    #[serde(default)]
    pub experience: ExperienceInfo,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub eligibility: Eligibility,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceInfo {
    pub salary_expectation: Option<String>,
    pub total_years: Option<String>,
    pub it_years: Option<String>,
    pub security_years: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Remote / hybrid / on-site.
    pub work_preference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Eligibility {
    /// "Yes"/"No": legally authorized to work.
    pub authorized_to_work: Option<String>,
    /// "Yes"/"No": will require visa sponsorship.
    pub requires_sponsorship: Option<String>,
}

impl ProfileData {
    /// Condensed plain-text summary fed to the generative fallback.
    ///
    /// Only filled fields appear; the prompt should never carry "N/A" noise.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let mut push = |name: &str, value: &Option<String>| {
            if let Some(v) = value {
                if !v.is_empty() {
                    parts.push(format!("{}: {}", name, v));
                }
            }
        };
        push("Name", &self.personal.full_name);
        push("Email", &self.personal.email);
        push("City", &self.personal.city);
        push("State", &self.personal.state);
        push("Total experience", &self.experience.total_years);
        push("Salary expectation", &self.experience.salary_expectation);
        push("Work preference", &self.preferences.work_preference);
        push("Authorized to work", &self.eligibility.authorized_to_work);
        push("Requires sponsorship", &self.eligibility.requires_sponsorship);
        parts.join("\n")
    }
}
