//! Browser identities used when talking to undocumented platform surfaces.
//!
//! Requests that look like they come from a script get bot-checked, so the
//! page scraper draws a random realistic user agent per request and the
//! hosted fallback walks a list of header/cookie permutations.

use rand::seq::SliceRandom;

pub const REFERER: &str = "https://www.youtube.com/";

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Mobile/15E148 Safari/604.1";

/// How user agents are drawn from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Random,
    /// Always the first agent; keeps requests reproducible in tests
    Fixed,
}

/// One header/cookie permutation tried by the hosted fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub name: String,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub cookie: Option<String>,
}

impl RequestProfile {
    /// Apply this profile's identity to a request
    pub fn apply(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req = req.header("User-Agent", &self.user_agent).header("Referer", REFERER);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = &self.cookie {
            req = req.header("Cookie", cookie.as_str());
        }
        req
    }
}

#[derive(Debug, Clone)]
pub struct IdentityProvider {
    user_agents: Vec<String>,
    rotation: Rotation,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl IdentityProvider {
    /// Build a provider from a configured pool; an empty pool means the
    /// built-in defaults.
    pub fn new(user_agents: Vec<String>) -> Self {
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            user_agents
        };
        Self {
            user_agents,
            rotation: Rotation::Random,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    pub fn user_agent(&self) -> &str {
        let picked = match self.rotation {
            Rotation::Random => self.user_agents.choose(&mut rand::thread_rng()),
            Rotation::Fixed => self.user_agents.first(),
        };
        picked.map(String::as_str).unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    /// Identity for a single page or API request, without cookies
    pub fn browser_profile(&self, lang: &str) -> RequestProfile {
        RequestProfile {
            name: "browser".to_string(),
            user_agent: self.user_agent().to_string(),
            headers: vec![("Accept-Language".to_string(), accept_language(lang))],
            cookie: None,
        }
    }

    /// Ordered header/cookie permutations for the hosted fallback
    pub fn profiles(&self, lang: &str) -> Vec<RequestProfile> {
        let desktop = self.user_agents.first().cloned().unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string());
        let alternate = self.user_agents.get(1).cloned().unwrap_or_else(|| desktop.clone());

        vec![
            RequestProfile {
                name: "consent-cookie".to_string(),
                user_agent: desktop.clone(),
                headers: vec![("Accept-Language".to_string(), accept_language(lang))],
                cookie: Some("CONSENT=YES+cb.20210328-17-p0.en+FX+999; SOCS=CAI".to_string()),
            },
            RequestProfile {
                name: "mobile".to_string(),
                user_agent: MOBILE_USER_AGENT.to_string(),
                headers: vec![
                    ("Accept-Language".to_string(), accept_language(lang)),
                    ("X-YouTube-Client-Name".to_string(), "2".to_string()),
                ],
                cookie: Some("PREF=hl=en&gl=US".to_string()),
            },
            RequestProfile {
                name: "plain".to_string(),
                user_agent: alternate,
                headers: vec![
                    ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
                    (
                        "Accept".to_string(),
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                    ),
                ],
                cookie: None,
            },
        ]
    }
}

fn accept_language(lang: &str) -> String {
    if lang.eq_ignore_ascii_case("en") {
        "en-US,en;q=0.9".to_string()
    } else {
        format!("{lang},en;q=0.8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool() {
        let provider = IdentityProvider::default();
        assert_eq!(provider.user_agents().len(), DEFAULT_USER_AGENTS.len());
    }

    #[test]
    fn test_random_agent_comes_from_pool() {
        let provider = IdentityProvider::new(vec!["a".into(), "b".into(), "c".into()]);
        for _ in 0..20 {
            let ua = provider.user_agent();
            assert!(["a", "b", "c"].contains(&ua));
        }
    }

    #[test]
    fn test_fixed_rotation() {
        let provider = IdentityProvider::new(vec!["first".into(), "second".into()]).with_rotation(Rotation::Fixed);
        assert_eq!(provider.user_agent(), "first");
        assert_eq!(provider.user_agent(), "first");
    }

    #[test]
    fn test_profiles_are_distinct() {
        let profiles = IdentityProvider::default().profiles("vi");
        assert_eq!(profiles.len(), 3);
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["consent-cookie", "mobile", "plain"]);
        assert!(profiles[0].cookie.is_some());
        assert_eq!(profiles[0].headers[0].1, "vi,en;q=0.8");
    }

    #[test]
    fn test_accept_language() {
        assert_eq!(accept_language("en"), "en-US,en;q=0.9");
        assert_eq!(accept_language("fr"), "fr,en;q=0.8");
    }
}
