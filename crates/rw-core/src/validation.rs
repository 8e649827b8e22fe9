//! # Validation
//!
//! The rule table every payload passes before it reaches orchestration.
//! All violations of one payload are reported together, comma-joined.
//! Lengths count characters of the trimmed value.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::Image;
use crate::payloads::{
    ArticleDraft, CommentDraft, NewUser, PortalDraft, PortalPatch, SectionPatch, TopicDraft,
    UserPatch,
};

pub const USERNAME_LEN: (usize, usize) = (3, 25);
pub const EMAIL_MAX_LEN: usize = 35;
pub const PORTAL_TITLE_LEN: (usize, usize) = (3, 100);
pub const PORTAL_DESCRIPTION_MAX_LEN: usize = 1500;
pub const TOPIC_TITLE_LEN: (usize, usize) = (3, 100);
pub const TOPIC_CONTENT_LEN: (usize, usize) = (10, 5000);
pub const COMMENT_CONTENT_LEN: (usize, usize) = (1, 5000);

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/[a-zA-Z0-9.+-]+;base64,[A-Za-z0-9+/]+={0,2}$")
        .expect("valid data uri regex")
});

/// Password rules. `require_mixed` adds the upper/lower/digit requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_len: usize,
    pub require_mixed: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: 6,
            require_mixed: false,
        }
    }
}

#[derive(Debug, Default)]
struct Violations(Vec<String>);

impl Violations {
    fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.0.push(message.into());
        }
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self.0.join(", ")))
        }
    }
}

fn len(value: &str) -> usize {
    value.trim().chars().count()
}

fn within(value: &str, (min, max): (usize, usize)) -> bool {
    (min..=max).contains(&len(value))
}

fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// `http(s)` URLs only.
pub fn is_web_url(value: &str) -> bool {
    url::Url::parse(value.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

pub fn is_image_source(value: &str) -> bool {
    let value = value.trim();
    is_web_url(value) || DATA_URI_RE.is_match(value)
}

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

pub fn is_username(value: &str) -> bool {
    let value = value.trim();
    within(value, USERNAME_LEN) && value.chars().all(|c| c.is_ascii_alphanumeric())
}

fn check_image(v: &mut Violations, image: Option<&Image>, field: &str) {
    if let Some(image) = image {
        v.check(
            is_image_source(&image.src),
            format!("{field}.src must be a URL or a base64 data URI."),
        );
    }
}

pub fn validate_article(draft: &ArticleDraft) -> Result<()> {
    let mut v = Violations::default();
    v.check(present(&draft.title), "Title is required.");
    v.check(present(&draft.intro), "Intro is required.");
    v.check(!draft.content.is_empty(), "At least one section is required.");
    for (i, section) in draft.content.iter().enumerate() {
        v.check(present(&section.title), format!("Section {} needs a title.", i + 1));
        v.check(present(&section.text), format!("Section {} needs text.", i + 1));
        if let Some(image) = &section.image {
            v.check(
                is_image_source(&image.src),
                format!("Section {} image.src must be a URL or a base64 data URI.", i + 1),
            );
        }
    }
    match &draft.info_box {
        Some(info_box) => {
            v.check(present(&info_box.title), "infoBox.title is required.");
            check_image(&mut v, info_box.image.as_ref(), "infoBox.image");
            for (i, row) in info_box.info.iter().enumerate() {
                v.check(present(&row.label), format!("infoBox row {} needs a label.", i + 1));
            }
        }
        None => v.check(false, "infoBox.title is required."),
    }
    for (i, reference) in draft.references.iter().enumerate() {
        v.check(present(&reference.name), format!("Reference {} needs a name.", i + 1));
        v.check(
            is_web_url(&reference.link),
            format!("Reference {} needs a valid URL link.", i + 1),
        );
    }
    v.finish()
}

pub fn validate_section_patch(patch: &SectionPatch) -> Result<()> {
    let mut v = Violations::default();
    if let Some(title) = &patch.title {
        v.check(present(title), "Section title cannot be empty.");
    }
    if let Some(text) = &patch.text {
        v.check(present(text), "Section text cannot be empty.");
    }
    if let Some(image) = &patch.image {
        v.check(
            is_image_source(&image.src),
            "image.src must be a URL or a base64 data URI.",
        );
    }
    v.finish()
}

fn check_portal_title(v: &mut Violations, title: &str) {
    v.check(
        within(title, PORTAL_TITLE_LEN),
        "Portal title must be between 3 and 100 characters long.",
    );
}

fn check_portal_description(v: &mut Violations, description: &str) {
    v.check(
        present(description) && len(description) <= PORTAL_DESCRIPTION_MAX_LEN,
        "Portal description is required and must be at most 1500 characters long.",
    );
}

pub fn validate_portal(draft: &PortalDraft) -> Result<()> {
    let mut v = Violations::default();
    check_portal_title(&mut v, &draft.portal_title);
    check_portal_description(&mut v, &draft.portal_description);
    check_image(&mut v, draft.portal_image.as_ref(), "portalImage");
    v.finish()
}

pub fn validate_portal_patch(patch: &PortalPatch) -> Result<()> {
    let mut v = Violations::default();
    if let Some(title) = &patch.portal_title {
        check_portal_title(&mut v, title);
    }
    if let Some(description) = &patch.portal_description {
        check_portal_description(&mut v, description);
    }
    check_image(&mut v, patch.portal_image.as_ref(), "portalImage");
    v.finish()
}

pub fn validate_topic(draft: &TopicDraft) -> Result<()> {
    let mut v = Violations::default();
    v.check(
        within(&draft.title, TOPIC_TITLE_LEN),
        "Title should be between 3 and 100 characters long.",
    );
    v.check(
        within(&draft.content, TOPIC_CONTENT_LEN),
        "Content should be between 10 and 5000 characters long.",
    );
    v.finish()
}

pub fn validate_comment(draft: &CommentDraft) -> Result<()> {
    let mut v = Violations::default();
    v.check(
        within(&draft.content, COMMENT_CONTENT_LEN),
        "Comment content is required and must be at most 5000 characters long.",
    );
    v.finish()
}

fn check_password(v: &mut Violations, password: &str, policy: PasswordPolicy) {
    v.check(
        password.chars().count() >= policy.min_len,
        format!(
            "Password should be at least {} characters long.",
            policy.min_len
        ),
    );
    if policy.require_mixed {
        v.check(
            password.chars().any(|c| c.is_ascii_lowercase())
                && password.chars().any(|c| c.is_ascii_uppercase())
                && password.chars().any(|c| c.is_ascii_digit()),
            "Password must contain an uppercase letter, a lowercase letter and a number.",
        );
    }
}

fn check_email(v: &mut Violations, email: &str) {
    v.check(is_email(email), "Invalid email format.");
    v.check(
        len(email) <= EMAIL_MAX_LEN,
        "Email must be at most 35 characters long.",
    );
}

fn check_username(v: &mut Violations, username: &str) {
    v.check(
        is_username(username),
        "Username must be 3 to 25 letters or numbers.",
    );
}

pub fn validate_new_user(user: &NewUser, policy: PasswordPolicy) -> Result<()> {
    let mut v = Violations::default();
    check_username(&mut v, &user.username);
    check_email(&mut v, &user.email);
    check_password(&mut v, &user.password, policy);
    v.finish()
}

pub fn validate_user_patch(patch: &UserPatch, policy: PasswordPolicy) -> Result<()> {
    let mut v = Violations::default();
    if let Some(username) = &patch.username {
        check_username(&mut v, username);
    }
    if let Some(email) = &patch.email {
        check_email(&mut v, email);
    }
    if let Some(password) = &patch.password {
        check_password(&mut v, password, policy);
    }
    v.finish()
}

pub fn validate_password(password: &str, policy: PasswordPolicy) -> Result<()> {
    let mut v = Violations::default();
    check_password(&mut v, password, policy);
    v.finish()
}

/// Canonical stored form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InfoBox, Reference};
    use crate::payloads::SectionDraft;

    fn valid_article() -> ArticleDraft {
        ArticleDraft {
            title: "Rust".into(),
            intro: "A systems language.".into(),
            content: vec![SectionDraft {
                title: "History".into(),
                text: "Started at Mozilla.".into(),
                ..SectionDraft::default()
            }],
            info_box: Some(InfoBox {
                title: "Rust".into(),
                ..InfoBox::default()
            }),
            references: vec![Reference {
                name: "Homepage".into(),
                link: "https://www.rust-lang.org".into(),
            }],
            status: None,
        }
    }

    #[test]
    fn accepts_a_complete_article() {
        assert!(validate_article(&valid_article()).is_ok());
    }

    #[test]
    fn reports_every_article_violation_at_once() {
        let mut draft = valid_article();
        draft.title = "  ".into();
        draft.info_box = None;
        draft.references[0].link = "not a url".into();

        let err = validate_article(&draft).unwrap_err();
        let AppError::ValidationFailed(msg) = err else {
            panic!("expected validation failure");
        };
        assert!(msg.contains("Title is required."));
        assert!(msg.contains("infoBox.title is required."));
        assert!(msg.contains("Reference 1 needs a valid URL link."));
    }

    #[test]
    fn article_needs_a_section() {
        let mut draft = valid_article();
        draft.content.clear();
        assert!(validate_article(&draft).is_err());
    }

    #[test]
    fn portal_title_bounds() {
        let mut draft = PortalDraft {
            portal_title: "ab".into(),
            portal_description: "About things".into(),
            portal_image: None,
        };
        assert!(validate_portal(&draft).is_err());
        draft.portal_title = "abc".into();
        assert!(validate_portal(&draft).is_ok());
        draft.portal_title = "x".repeat(101);
        assert!(validate_portal(&draft).is_err());
    }

    #[test]
    fn portal_image_accepts_url_or_data_uri() {
        assert!(is_image_source("https://example.com/a.png"));
        assert!(is_image_source("data:image/png;base64,iVBORw0KGgo="));
        assert!(!is_image_source("javascript:alert(1)"));
        assert!(!is_image_source("data:text/html;base64,PGgxPg=="));
    }

    #[test]
    fn topic_content_bounds() {
        let short = TopicDraft {
            title: "Bug?".into(),
            content: "too short".into(),
        };
        assert!(validate_topic(&short).is_err());
        let ok = TopicDraft {
            title: "Bug?".into(),
            content: "this is long enough".into(),
        };
        assert!(validate_topic(&ok).is_ok());
    }

    #[test]
    fn usernames_are_alphanumeric() {
        assert!(is_username("alice"));
        assert!(is_username("Bob42"));
        assert!(!is_username("al"));
        assert!(!is_username("alice_smith"));
        assert!(!is_username(&"a".repeat(26)));
    }

    #[test]
    fn email_length_is_capped() {
        let user = NewUser {
            username: "alice".into(),
            email: format!("{}@example.com", "a".repeat(30)),
            password: "secret1".into(),
            bio: None,
        };
        assert!(validate_new_user(&user, PasswordPolicy::default()).is_err());
    }

    #[test]
    fn mixed_password_policy() {
        let strict = PasswordPolicy {
            min_len: 6,
            require_mixed: true,
        };
        assert!(validate_password("abcdef", PasswordPolicy::default()).is_ok());
        assert!(validate_password("abcdef", strict).is_err());
        assert!(validate_password("Abcde1", strict).is_ok());
        assert!(validate_password("abc", PasswordPolicy::default()).is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
