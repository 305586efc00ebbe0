//! REST endpoints and route templates
//!
//! A route template is the method plus the path with ids replaced by
//! placeholders. Together with the major parameter (the channel, guild, or
//! webhook id the path is scoped to) it identifies a rate limit bucket.

use reqwest::Method;
use std::fmt;
use std::time::Duration;

/// Known endpoints, relative to the versioned API base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Gateway,
    GatewayBot,
    CurrentUser,
    User,
    UserChannel,
    Channel,
    Message,
    MessagesBulkDelete,
    ChannelTyping,
    Pins,
    Reaction,
    Server,
    ServerChannel,
    Role,
    ServerMember,
    ServerMemberRole,
    Ban,
    ChannelWebhook,
    Webhook,
    WebhookSend,
    Invite,
}

impl Endpoint {
    /// Path with `{}` placeholders
    pub fn template(self) -> &'static str {
        match self {
            Self::Gateway => "/gateway",
            Self::GatewayBot => "/gateway/bot",
            Self::CurrentUser => "/users/@me",
            Self::User => "/users/{}",
            Self::UserChannel => "/users/@me/channels",
            Self::Channel => "/channels/{}",
            Self::Message => "/channels/{}/messages",
            Self::MessagesBulkDelete => "/channels/{}/messages/bulk-delete",
            Self::ChannelTyping => "/channels/{}/typing",
            Self::Pins => "/channels/{}/pins",
            Self::Reaction => "/channels/{}/messages/{}/reactions",
            Self::Server => "/guilds",
            Self::ServerChannel => "/guilds/{}/channels",
            Self::Role => "/guilds/{}/roles",
            Self::ServerMember => "/guilds/{}/members/{}",
            Self::ServerMemberRole => "/guilds/{}/members/{}/roles/{}",
            Self::Ban => "/guilds/{}/bans",
            Self::ChannelWebhook => "/channels/{}/webhooks",
            Self::Webhook => "/webhooks/{}",
            Self::WebhookSend => "/webhooks/{}/{}",
            Self::Invite => "/invites/{}",
        }
    }

    /// Index of the parameter the rate limit is scoped to
    pub fn major_parameter_position(self) -> Option<usize> {
        match self {
            Self::Gateway
            | Self::GatewayBot
            | Self::CurrentUser
            | Self::User
            | Self::UserChannel
            | Self::Invite => None,
            _ => Some(0),
        }
    }

    /// Fixed rate limit that the server headers under-report
    pub fn hardcoded_limit(self) -> Option<Duration> {
        match self {
            Self::Reaction => Some(Duration::from_millis(250)),
            _ => None,
        }
    }

    /// Build a route for this endpoint
    ///
    /// Parameters beyond the template's placeholders are appended as extra
    /// path segments, e.g. a message id on `Message` or an emoji on `Reaction`.
    pub fn route(self, method: Method, params: &[&str]) -> Route {
        let template = self.template();
        let mut path = String::with_capacity(template.len() + 20 * params.len());
        let mut remaining = params.iter();
        let mut pieces = template.split("{}").peekable();

        while let Some(piece) = pieces.next() {
            path.push_str(piece);
            if pieces.peek().is_some() {
                if let Some(param) = remaining.next() {
                    path.push_str(param);
                }
            }
        }
        let mut extra = 0;
        for param in remaining {
            path.push('/');
            path.push_str(param);
            extra += 1;
        }

        let mut key_template = template.to_string();
        for _ in 0..extra {
            key_template.push_str("/{}");
        }

        Route {
            key: RouteKey {
                method,
                template: key_template,
            },
            major: self
                .major_parameter_position()
                .and_then(|i| params.get(i))
                .map(|p| (*p).to_string()),
            path,
            hardcoded_limit: self.hardcoded_limit(),
        }
    }
}

/// Method plus normalized path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub template: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// A concrete request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub key: RouteKey,
    /// Id the bucket is scoped to, if any
    pub major: Option<String>,
    /// Concrete path, starting with `/`
    pub path: String,
    pub hardcoded_limit: Option<Duration>,
}

/// Path segments whose following id is a major parameter
const MAJOR_SEGMENTS: [&str; 3] = ["channels", "guilds", "webhooks"];

impl Route {
    /// Normalize an arbitrary API path
    ///
    /// Numeric segments become `{}`; the id after the first `channels`,
    /// `guilds`, or `webhooks` segment becomes the major parameter.
    pub fn from_path(method: Method, path: &str) -> Route {
        let path = path.split('?').next().unwrap_or_default();
        let mut template = String::with_capacity(path.len());
        let mut major = None;
        let mut previous = "";

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            template.push('/');
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                if major.is_none() && MAJOR_SEGMENTS.contains(&previous) {
                    major = Some(segment.to_string());
                }
                template.push_str("{}");
            } else if previous == "reactions" {
                // Emoji names are not ids but still vary per request
                template.push_str("{}");
            } else {
                template.push_str(segment);
            }
            previous = segment;
        }

        let hardcoded_limit = template
            .contains("/reactions")
            .then(|| Duration::from_millis(250));

        Route {
            key: RouteKey { method, template },
            major,
            path: if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            },
            hardcoded_limit,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_route_substitutes_parameters() {
        let route = Endpoint::Message.route(Method::POST, &["123"]);
        assert_eq!(route.path, "/channels/123/messages");
        assert_eq!(route.key.template, "/channels/{}/messages");
        assert_eq!(route.major.as_deref(), Some("123"));
        assert_eq!(route.to_string(), "POST /channels/123/messages");
    }

    #[test]
    fn test_extra_parameters_are_appended() {
        let route = Endpoint::Message.route(Method::DELETE, &["123", "456"]);
        assert_eq!(route.path, "/channels/123/messages/456");
        assert_eq!(route.key.template, "/channels/{}/messages/{}");
        assert_eq!(route.major.as_deref(), Some("123"));
    }

    #[test]
    fn test_endpoint_without_major_parameter() {
        let route = Endpoint::User.route(Method::GET, &["80351110224678912"]);
        assert_eq!(route.path, "/users/80351110224678912");
        assert!(route.major.is_none());
    }

    #[test]
    fn test_reaction_has_hardcoded_limit() {
        let route = Endpoint::Reaction.route(Method::PUT, &["1", "2", "%F0%9F%91%8D", "@me"]);
        assert_eq!(route.path, "/channels/1/messages/2/reactions/%F0%9F%91%8D/@me");
        assert_eq!(route.hardcoded_limit, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_from_path_normalizes_ids() {
        let a = Route::from_path(Method::PATCH, "/guilds/41771983423143936/roles/41771983423143937");
        let b = Route::from_path(Method::PATCH, "guilds/41771983423143936/roles/99?reason=x");

        assert_eq!(a.key, b.key);
        assert_eq!(a.key.template, "/guilds/{}/roles/{}");
        assert_eq!(a.major.as_deref(), Some("41771983423143936"));
        assert_eq!(b.path, "/guilds/41771983423143936/roles/99");
    }

    #[test]
    fn test_from_path_major_differs_per_channel() {
        let a = Route::from_path(Method::POST, "/channels/1/messages");
        let b = Route::from_path(Method::POST, "/channels/2/messages");
        assert_eq!(a.key, b.key);
        assert_ne!(a.major, b.major);
    }

    #[test]
    fn test_from_path_reactions() {
        let route = Route::from_path(Method::PUT, "/channels/1/messages/2/reactions/%F0%9F%91%8D/@me");
        assert_eq!(route.key.template, "/channels/{}/messages/{}/reactions/{}/@me");
        assert!(route.hardcoded_limit.is_some());
    }
}
