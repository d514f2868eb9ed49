use proptest::prelude::*;

use ranklog::{
    engine::ranked_class::RankedClass,
    participant::Participant,
    types::{Average, Participation, Scope},
};

const SCOPE: Scope = Scope { round: 1, class: 1 };

#[derive(Debug, Clone)]
enum Action {
    Withdraw { target: u8 },
    Confirm { target: u8 },
    Cut { limit: Option<u8> },
    Seed,
    Recompute,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => any::<u8>().prop_map(|target| Action::Withdraw { target }),
        4 => any::<u8>().prop_map(|target| Action::Confirm { target }),
        2 => proptest::option::of(0u8..40).prop_map(|limit| Action::Cut { limit }),
        1 => Just(Action::Seed),
        1 => Just(Action::Recompute),
    ]
}

fn participation_strategy() -> impl Strategy<Value = Participation> {
    prop_oneof![
        Just(Participation::Yes),
        Just(Participation::No),
        Just(Participation::Unknown),
    ]
}

fn class_strategy() -> impl Strategy<Value = RankedClass> {
    (
        prop::collection::vec((0u32..10_000, participation_strategy(), any::<bool>()), 1..40),
        proptest::option::of(0u32..40),
    )
        .prop_map(|(rows, limit)| {
            let entries = rows
                .into_iter()
                .enumerate()
                .map(|(idx, (average, participation, champion))| Participant {
                    id: idx as u64 + 1,
                    scope: SCOPE,
                    member_ref: format!("m{idx}"),
                    rank: 0,
                    order: idx as u32 + 1,
                    average: Average::from_thousandths(average),
                    participation,
                    champion_label: if champion { "kampioen".to_string() } else { String::new() },
                })
                .collect();
            let mut class = RankedClass::new(SCOPE, limit, entries);
            class.recompute_ranks();
            class
        })
}

fn pick(class: &RankedClass, target: u8) -> u64 {
    let ps = class.participants();
    ps[usize::from(target) % ps.len()].id
}

fn apply(class: &mut RankedClass, action: &Action) {
    match action {
        Action::Withdraw { target } => {
            let id = pick(class, *target);
            class.withdraw(id).expect("withdraw");
        }
        Action::Confirm { target } => {
            let id = pick(class, *target);
            class.confirm(id).expect("confirm");
        }
        Action::Cut { limit } => {
            class.apply_cut(limit.map(u32::from));
        }
        Action::Seed => class.seed(),
        Action::Recompute => {
            class.recompute_ranks();
        }
    }
}

proptest! {
    #[test]
    fn random_mutations_keep_order_bijective_and_ranks_compact(
        mut class in class_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..120),
    ) {
        for action in &actions {
            apply(&mut class, action);
            prop_assert!(class.check_invariants().is_ok(), "{:?} after {:?}", class.check_invariants(), action);
        }
    }

    #[test]
    fn repeating_withdraw_or_confirm_changes_nothing(
        mut class in class_strategy(),
        target in any::<u8>(),
        withdraw in any::<bool>(),
    ) {
        let id = pick(&class, target);
        let once = if withdraw {
            class.withdraw(id).expect("withdraw");
            class.clone()
        } else {
            class.confirm(id).expect("confirm");
            class.clone()
        };

        if withdraw {
            class.withdraw(id).expect("withdraw again");
        } else {
            class.confirm(id).expect("confirm again");
        }
        prop_assert_eq!(class, once);
    }

    #[test]
    fn cut_round_trip_restores_ranks(
        mut class in class_strategy(),
        other in proptest::option::of(0u32..60),
    ) {
        let before = class.clone();
        let original = class.limit();

        class.apply_cut(other);
        class.apply_cut(original);

        prop_assert_eq!(class, before);
    }
}
