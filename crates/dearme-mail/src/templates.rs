//! Account emails.

use crate::gateway::OutboundEmail;

pub fn verification_email(username: &str, email: &str, link: &str) -> OutboundEmail {
    OutboundEmail::new(
        vec![email.to_string()],
        "Verify your DearMe account",
        format!(
            "Hi {username},<br><br>\
             Please verify your email by clicking this link:<br>\
             <a href=\"{link}\">{link}</a><br><br>\
             This link will expire in 24 hours."
        ),
    )
}

pub fn password_reset_email(username: &str, email: &str, link: &str) -> OutboundEmail {
    OutboundEmail::new(
        vec![email.to_string()],
        "Reset your DearMe password",
        format!(
            "Hi {username},<br><br>\
             You requested a password reset.<br>\
             Click this link to set a new password:<br>\
             <a href=\"{link}\">{link}</a><br><br>\
             This link will expire in 24 hours."
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_appear_in_body() {
        let mail = verification_email("ada", "ada@example.com", "https://dearme.app/auth/verify/t");
        assert_eq!(mail.to, vec!["ada@example.com"]);
        assert!(mail.html_body.contains("Hi ada"));
        assert!(mail.html_body.contains("href=\"https://dearme.app/auth/verify/t\""));

        let mail = password_reset_email("ada", "ada@example.com", "https://x/r");
        assert_eq!(mail.subject, "Reset your DearMe password");
    }
}
