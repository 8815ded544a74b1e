use crate::model::common::Rights;

/// A role a route can demand of its caller.
pub trait Role: Send + Sync + 'static {
    /// The minimum rights the role requires.
    const RIGHTS: Rights;
}

/// Any signed-in user.
pub struct Member;

impl Role for Member {
    const RIGHTS: Rights = Rights::Member;
}

/// An organisation officer.
pub struct Officer;

impl Role for Officer {
    const RIGHTS: Rights = Rights::Officer;
}
