use crate::models::{UserProfile, UserRole};

pub fn is_admin_role(profile: Option<&UserProfile>) -> bool {
    profile.is_some_and(|p| p.role == UserRole::Admin)
}

pub fn is_teacher_role(profile: Option<&UserProfile>) -> bool {
    profile.is_some_and(|p| p.role == UserRole::Teacher)
}
