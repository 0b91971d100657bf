//! Robots.txt rules backed by the robotstxt crate

use robotstxt::DefaultMatcher;

/// Robots.txt content for one origin
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// `None` allows everything
    content: Option<String>,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Rules used when robots.txt is missing or cannot be fetched
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.content.is_none()
    }

    /// Checks a full URL against the rules for `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}
