//! Who may act on which order, and who may open which page
use crate::status::{Role, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// The acting user plus the department they are operating, if emulating one.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub user: &'a User,
    pub view_as: Option<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Reports,
    Engineering,
    Sales,
    Department(Role),
    UserAdmin,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
    pub fn actor(&self) -> Actor<'_> {
        Actor {
            user: self,
            view_as: None,
        }
    }
    /// Operate a department view. Only supervisors actually take on the emulated role.
    pub fn acting_as(&self, role: Role) -> Actor<'_> {
        Actor {
            user: self,
            view_as: Some(role),
        }
    }
}

impl Actor<'_> {
    pub fn effective_role(&self) -> Role {
        match self.view_as {
            Some(role) if self.user.role.is_supervisor() => role,
            _ => self.user.role,
        }
    }

    pub fn owns(&self, status: Status) -> bool {
        status.owner() == Some(self.effective_role())
    }
}

pub fn can_access(role: Role, page: Page) -> bool {
    match (role, page) {
        (Role::Admin, _) => true,
        (Role::Gerente, Page::UserAdmin) => false,
        (Role::Gerente, _) => true,
        (_, Page::Dashboard | Page::Sales) => true,
        (Role::Engenharia, Page::Engineering) => true,
        (role, Page::Department(dept)) => role == dept,
        _ => false,
    }
}
