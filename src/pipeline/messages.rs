//! Outbound message templates, one per verdict.

use crate::pipeline::Verdict;

pub const WELCOME: &str = "Welcome to the group!";

pub fn hidden_number_warning(admin_contact: &str) -> String {
    format!(
        "Your phone number is hidden by your privacy settings.\n\n\
         If you want to join the main group, you'll need to temporarily set \
         'Who can see my number' to 'Everyone' in Settings > Privacy, then reply 'join' again.\n\n\
         Don't worry, you can change it back after you're verified.\n\n\
         If you'd rather not do that, you can message the admin directly at {admin_contact}"
    )
}

pub fn carrier_rejection(admin_contact: &str) -> String {
    format!(
        "Sorry, only mobile phone numbers can join automatically. \
         If you think this is a mistake, please message the admin at {admin_contact}."
    )
}

pub fn unverified_welcome(admin_contact: &str) -> String {
    format!(
        "Welcome! You've been added to the group. \
         Please message the admin at {admin_contact} to get verified."
    )
}

/// The message sent for a verdict.
pub fn for_verdict(verdict: Verdict, admin_contact: &str) -> String {
    match verdict {
        Verdict::HiddenNumberWarning => hidden_number_warning(admin_contact),
        Verdict::CarrierRejected => carrier_rejection(admin_contact),
        Verdict::RoutedVerified => WELCOME.to_string(),
        Verdict::RoutedUnverified => unverified_welcome(admin_contact),
    }
}
