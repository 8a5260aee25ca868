//! vCard export of webinar participants.
//!
//! After a webinar the operator imports every registrant into the phone
//! contact list as one group file, so a follow-up call shows who is
//! calling. One `<group>.vcf` file holds a vCard 3.0 block per account;
//! the group name doubles as the organisation field.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::models::Account;

/// One participant contact card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VCard {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub organisation: String,
}

impl VCard {
    /// Card for one account. The group name fills the given-name slot so
    /// every card of a webinar sorts together in the contact list.
    #[must_use]
    pub fn for_account(account: &Account, group: &str) -> Self {
        Self {
            first_name: group.to_string(),
            last_name: format!("{} {}", account.name, account.family_name),
            email: account.email.clone(),
            phone: account.phone.clone(),
            organisation: group.to_string(),
        }
    }

    /// Serialize as a vCard 3.0 block.
    #[must_use]
    pub fn to_vcf(&self) -> String {
        [
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!("ORG:{};", self.organisation),
            format!("N:{};{};;;", self.last_name, self.first_name),
            format!("TEL:{}", self.phone),
            format!("EMAIL:{}", self.email),
            "END:VCARD".to_string(),
        ]
        .join("\n")
    }
}

/// Write every account as one `<group>.vcf` group file under `dir`.
pub fn save_group_file(dir: &Path, group: &str, accounts: &[Account]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{group}.vcf"));
    let mut content = String::new();
    for account in accounts {
        content.push_str(&VCard::for_account(account, group).to_vcf());
        content.push('\n');
    }
    fs::write(&path, content)?;
    info!(path = %path.display(), cards = accounts.len(), "saved contact group");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str, phone: &str) -> Account {
        Account {
            id: 1,
            webinar_id: 1,
            registered_at: chrono::Utc::now().naive_utc(),
            family_name: "Иванова".to_string(),
            name: "Мария".to_string(),
            father_name: "Петровна".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn vcard_serializes_all_fields() {
        let card = VCard::for_account(&account("maria@example.com", "+79161234567"), "Грамматика 2025-02-20");
        assert_eq!(
            card.to_vcf(),
            "BEGIN:VCARD\n\
             VERSION:3.0\n\
             ORG:Грамматика 2025-02-20;\n\
             N:Мария Иванова;Грамматика 2025-02-20;;;\n\
             TEL:+79161234567\n\
             EMAIL:maria@example.com\n\
             END:VCARD"
        );
    }

    #[test]
    fn group_file_holds_one_card_per_account() {
        let dir = tempfile::tempdir().unwrap();
        let accounts =
            [account("maria@example.com", "+79161234567"), account("ivan@example.com", "+79167654321")];
        let path = save_group_file(dir.path(), "Группа", &accounts).unwrap();

        assert_eq!(path.file_name().unwrap(), "Группа.vcf");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("BEGIN:VCARD").count(), 2);
        assert!(content.contains("EMAIL:ivan@example.com"));
    }

    #[test]
    fn empty_webinar_writes_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_group_file(dir.path(), "Группа", &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
