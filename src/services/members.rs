//! Member directory service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{is_valid_email, normalize_email, Member, UpdateMember},
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<Member>> {
        self.repository.members.list().await
    }

    /// Partial profile update. A new email is validated, normalized and
    /// must not belong to another member.
    pub async fn update(&self, id: i32, update: UpdateMember) -> AppResult<Member> {
        update.validate()?;
        let mut member = self.repository.members.get_by_id(id).await?;

        if let Some(ref name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("Name cannot be empty".to_string()));
            }
            member.name = name.to_string();
        }

        if let Some(ref email) = update.email {
            let email = normalize_email(email);
            if !is_valid_email(&email) {
                return Err(AppError::Validation("Invalid email format".to_string()));
            }
            if let Some(existing) = self.repository.members.find_by_email(&email).await? {
                if existing.id != id {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }
            }
            member.email = email;
        }

        if update.phone.is_some() {
            member.phone = update.phone;
        }
        if update.address.is_some() {
            member.address = update.address;
        }
        if let Some(membership_type) = update.membership_type {
            member.membership_type = membership_type;
        }

        let member = self.repository.members.update(&member).await?;
        tracing::info!(member_id = id, "Member updated");
        Ok(member)
    }

    /// Delete a member with no active loans, along with their history
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.members.delete(id).await?;
        tracing::info!(member_id = id, "Member deleted");
        Ok(())
    }
}
