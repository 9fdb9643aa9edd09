//! The process-wide decision strategy lives in its own test binary so that
//! changing it cannot race with other tests.

use featguard_auth::{
    AuthzedAction, DecisionStrategy, Permission, RoleBasedPolicy, SecurityManager, User,
    global_decision_strategy, set_global_decision_strategy,
};
use featguard_core::{Entity, Resource};

#[test]
fn global_strategy_defaults_to_unanimous_and_applies_to_managers() {
    assert_eq!(global_decision_strategy(), DecisionStrategy::Unanimous);
    assert_eq!(Permission::global_decision_strategy(), DecisionStrategy::Unanimous);

    let manager = SecurityManager::new(
        "p",
        vec![
            Permission::builder("reader")
                .actions([AuthzedAction::Read])
                .policy(RoleBasedPolicy::new(["reader"]))
                .build()
                .unwrap(),
            Permission::builder("auditor")
                .actions([AuthzedAction::Read])
                .policy(RoleBasedPolicy::new(["auditor"]))
                .build()
                .unwrap(),
        ],
    );
    let reader = User::new("r", ["reader"]);
    let entity: Resource = Entity::new("driver").into();

    assert!(!manager.check(Some(&reader), &entity, &[AuthzedAction::Read]).granted);

    Permission::set_global_decision_strategy(DecisionStrategy::Affirmative);
    assert_eq!(global_decision_strategy(), DecisionStrategy::Affirmative);
    assert!(manager.check(Some(&reader), &entity, &[AuthzedAction::Read]).granted);

    // an explicit manager strategy wins over the global one
    let pinned = SecurityManager::new("p", manager.permissions().to_vec())
        .with_decision_strategy(DecisionStrategy::Unanimous);
    assert!(!pinned.check(Some(&reader), &entity, &[AuthzedAction::Read]).granted);

    set_global_decision_strategy(DecisionStrategy::Unanimous);
    assert!(!manager.check(Some(&reader), &entity, &[AuthzedAction::Read]).granted);
}
