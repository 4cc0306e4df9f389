//! Cascade policy — which transitions fan out across group boundaries.
//!
//! Modelled as an explicit rule table rather than hard-coded cross-entity
//! calls, so a new entity kind registers its cascade behaviour without the
//! engine changing.

use tenure_core::{entity::EntityKind, period::MembershipKind};

use crate::action::ActionKind;

/// What happens to the current members of a group when the group itself
/// goes through an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeEffect {
  /// Run the given action on each member too, in the same transaction.
  Propagate(ActionKind),
  /// Close the membership but leave the member's own periods alone.
  Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeRule {
  pub group_kind: EntityKind,
  pub action:     ActionKind,
  pub membership: MembershipKind,
  pub effect:     CascadeEffect,
}

#[derive(Debug, Clone, Default)]
pub struct CascadePolicy {
  rules: Vec<CascadeRule>,
}

impl CascadePolicy {
  /// No cascading at all.
  pub fn empty() -> Self { Self::default() }

  /// The stock rules: retiring or releasing a tag team or stable does the
  /// same to its current members (transitively — a stable's tag teams pull
  /// their own wrestlers along); a manager leaving only detaches clients.
  pub fn standard() -> Self {
    let mut policy = Self::default();
    for action in [ActionKind::Retire, ActionKind::Release] {
      policy = policy
        .with_rule(CascadeRule {
          group_kind: EntityKind::TagTeam,
          action,
          membership: MembershipKind::TagTeam,
          effect: CascadeEffect::Propagate(action),
        })
        .with_rule(CascadeRule {
          group_kind: EntityKind::Stable,
          action,
          membership: MembershipKind::Stable,
          effect: CascadeEffect::Propagate(action),
        })
        .with_rule(CascadeRule {
          group_kind: EntityKind::Manager,
          action,
          membership: MembershipKind::Management,
          effect: CascadeEffect::Detach,
        });
    }
    policy
  }

  pub fn with_rule(mut self, rule: CascadeRule) -> Self {
    self.rules.push(rule);
    self
  }

  pub fn rules_for(
    &self,
    kind: EntityKind,
    action: ActionKind,
  ) -> impl Iterator<Item = &CascadeRule> + '_ {
    self
      .rules
      .iter()
      .filter(move |r| r.group_kind == kind && r.action == action)
  }
}
