use ranklog::{
    engine::ranked_class::{ConfirmOutcome, CutOutcome, RankedClass, RankingError, WithdrawOutcome},
    participant::Participant,
    types::{Average, Participation, ParticipantId, Scope},
};

const SCOPE: Scope = Scope { round: 3, class: 17 };

fn participant(id: ParticipantId, order: u32, average: u32, champion: bool) -> Participant {
    Participant {
        id,
        scope: SCOPE,
        member_ref: format!("member-{id}"),
        rank: 0,
        order,
        average: Average::from_thousandths(average),
        participation: Participation::Yes,
        champion_label: if champion { "Rayon 1".to_string() } else { String::new() },
    }
}

/// `n` participants; id `i` sits at order `i` with a strictly decreasing average.
fn descending_class(n: u64, limit: Option<u32>) -> RankedClass {
    let entries = (1..=n)
        .map(|i| participant(i, i as u32, 10_000 - i as u32 * 100, false))
        .collect();
    let mut class = RankedClass::new(SCOPE, limit, entries);
    class.recompute_ranks();
    class
}

fn rank_of(class: &RankedClass, id: ParticipantId) -> u32 {
    class.get(id).expect("participant").rank
}

fn order_of(class: &RankedClass, id: ParticipantId) -> u32 {
    class.get(id).expect("participant").order
}

fn qualified_ids(class: &RankedClass) -> Vec<ParticipantId> {
    class
        .participants()
        .iter()
        .filter(|p| p.rank > 0)
        .map(|p| p.id)
        .collect()
}

#[test]
fn ranks_skip_withdrawn_participants_and_stop_at_limit() {
    let mut entries: Vec<Participant> = (1..=5)
        .map(|i| participant(i, i as u32, 9_000, false))
        .collect();
    entries[1].participation = Participation::No;
    let mut class = RankedClass::new(SCOPE, Some(3), entries);

    class.recompute_ranks();

    let ranks: Vec<u32> = class.participants().iter().map(|p| p.rank).collect();
    assert_eq!(ranks, vec![1, 0, 2, 3, 0]);
    class.check_invariants().expect("invariants");
}

#[test]
fn missing_limit_ranks_every_eligible_participant() {
    let mut class = descending_class(6, Some(2));
    assert_eq!(class.qualified_count(), 2);

    let outcome = class.apply_cut(None);

    assert_eq!(outcome, CutOutcome::Changed { old: Some(2), new: None });
    assert_eq!(class.qualified_count(), 6);
    class.check_invariants().expect("invariants");
}

#[test]
fn stored_rows_are_sorted_and_renumbered() {
    let entries = vec![
        participant(7, 40, 8_000, false),
        participant(8, 12, 9_000, false),
        participant(9, 12, 7_000, false),
    ];
    let class = RankedClass::new(SCOPE, None, entries);

    let ids: Vec<_> = class.participants().iter().map(|p| (p.id, p.order)).collect();
    assert_eq!(ids, vec![(8, 1), (9, 2), (7, 3)]);
}

#[test]
fn cut_round_trip_restores_ranks_and_equal_cut_is_a_noop() {
    let mut class = descending_class(12, Some(4));
    class.withdraw(2).expect("withdraw");
    let before = class.clone();

    assert_eq!(class.apply_cut(Some(4)), CutOutcome::Unchanged);
    assert_eq!(class, before);

    class.apply_cut(Some(8));
    assert_eq!(class.qualified_count(), 8);
    class.apply_cut(Some(4));

    assert_eq!(class, before);
}

#[test]
fn withdrawing_a_reserve_changes_no_ranks() {
    let mut class = descending_class(6, Some(3));
    let before: Vec<_> = class.participants().iter().map(|p| (p.id, p.order, p.rank)).collect();

    let outcome = class.withdraw(5).expect("withdraw");

    assert_eq!(
        outcome,
        WithdrawOutcome::Withdrawn { previous_rank: 0, promoted: None }
    );
    let after: Vec<_> = class.participants().iter().map(|p| (p.id, p.order, p.rank)).collect();
    assert_eq!(after.len(), before.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!((b.0, b.1), (a.0, a.1));
        if b.0 != 5 {
            assert_eq!(b.2, a.2);
        }
    }
    assert_eq!(class.get(5).expect("p5").participation, Participation::No);
}

#[test]
fn withdrawing_a_qualifier_promotes_the_best_reserve() {
    let mut class = descending_class(10, Some(4));

    let outcome = class.withdraw(2).expect("withdraw");

    assert_eq!(
        outcome,
        WithdrawOutcome::Withdrawn { previous_rank: 2, promoted: Some(5) }
    );
    assert_eq!(qualified_ids(&class), vec![1, 3, 4, 5]);
    assert_eq!(rank_of(&class, 5), 4);
    assert_eq!(order_of(&class, 2), 2);
    assert_eq!(rank_of(&class, 2), 0);
    class.check_invariants().expect("invariants");
}

#[test]
fn promoted_reserve_overtakes_qualifiers_with_a_lower_average() {
    // 4 sits in the qualifying group on a champion slot with a low average
    let entries = vec![
        participant(1, 1, 9_500, false),
        participant(2, 2, 9_400, false),
        participant(3, 3, 9_300, false),
        participant(4, 4, 6_000, true),
        participant(5, 5, 8_000, false),
        participant(6, 6, 7_000, false),
    ];
    let mut class = RankedClass::new(SCOPE, Some(4), entries);
    class.recompute_ranks();

    class.withdraw(1).expect("withdraw");

    assert_eq!(order_of(&class, 5), 4);
    assert_eq!(order_of(&class, 4), 5);
    assert_eq!(rank_of(&class, 5), 3);
    assert_eq!(rank_of(&class, 4), 4);
    assert_eq!(rank_of(&class, 6), 0);
    class.check_invariants().expect("invariants");
}

#[test]
fn equal_averages_promote_the_lower_order_first() {
    let entries = vec![
        participant(1, 1, 9_000, false),
        participant(2, 2, 8_000, false),
        participant(3, 3, 7_000, false),
        participant(4, 4, 7_000, false),
    ];
    let mut class = RankedClass::new(SCOPE, Some(2), entries);
    class.recompute_ranks();

    let outcome = class.withdraw(1).expect("withdraw");

    assert_eq!(
        outcome,
        WithdrawOutcome::Withdrawn { previous_rank: 1, promoted: Some(3) }
    );
    assert_eq!(rank_of(&class, 4), 0);
}

#[test]
fn withdraw_and_confirm_are_idempotent() {
    let mut class = descending_class(8, Some(4));

    class.withdraw(3).expect("withdraw");
    let once = class.clone();
    assert_eq!(class.withdraw(3).expect("withdraw again"), WithdrawOutcome::AlreadyWithdrawn);
    assert_eq!(class, once);

    class.confirm(3).expect("confirm");
    let confirmed = class.clone();
    assert_eq!(class.confirm(3).expect("confirm again"), ConfirmOutcome::AlreadyConfirmed);
    assert_eq!(class, confirmed);
}

#[test]
fn confirming_an_unanswered_participant_keeps_its_position() {
    let mut entries: Vec<Participant> = (1..=4)
        .map(|i| participant(i, i as u32, 9_000 - i as u32, false))
        .collect();
    entries[2].participation = Participation::Unknown;
    let mut class = RankedClass::new(SCOPE, Some(2), entries);
    class.recompute_ranks();
    let before: Vec<_> = class.participants().iter().map(|p| (p.id, p.order, p.rank)).collect();

    assert_eq!(class.confirm(3).expect("confirm"), ConfirmOutcome::Confirmed);

    let after: Vec<_> = class.participants().iter().map(|p| (p.id, p.order, p.rank)).collect();
    assert_eq!(before, after);
    assert_eq!(class.get(3).expect("p3").participation, Participation::Yes);
}

#[test]
fn reserve_registering_again_returns_to_its_slot() {
    let mut class = descending_class(12, Some(8));

    class.withdraw(10).expect("withdraw");
    let outcome = class.confirm(10).expect("confirm");

    assert_eq!(outcome, ConfirmOutcome::Reinserted { order: 10, rank: 0 });
    assert_eq!(qualified_ids(&class), (1..=8).collect::<Vec<_>>());
    class.check_invariants().expect("invariants");
}

#[test]
fn qualifier_registering_again_joins_the_reserves() {
    let mut class = descending_class(12, Some(8));

    class.withdraw(3).expect("withdraw");
    assert_eq!(qualified_ids(&class), vec![1, 2, 4, 5, 6, 7, 8, 9]);

    let outcome = class.confirm(3).expect("confirm");
    assert_eq!(outcome, ConfirmOutcome::Reinserted { order: 9, rank: 0 });
    assert_eq!(order_of(&class, 9), 8);
    assert_eq!(order_of(&class, 10), 10);

    // the next withdrawal promotes it back above the lower averages
    class.withdraw(4).expect("withdraw");
    assert_eq!(rank_of(&class, 3), 3);
    assert_eq!(qualified_ids(&class), vec![1, 2, 3, 5, 6, 7, 8, 9]);
    class.check_invariants().expect("invariants");
}

#[test]
fn registering_again_below_a_full_limit_qualifies_directly() {
    let mut class = descending_class(5, Some(8));

    class.withdraw(2).expect("withdraw");
    let outcome = class.confirm(2).expect("confirm");

    assert_eq!(outcome, ConfirmOutcome::Reinserted { order: 2, rank: 2 });
    assert_eq!(qualified_ids(&class), vec![1, 2, 3, 4, 5]);
}

#[test]
fn seed_guarantees_champions_and_fills_by_average() {
    let entries = vec![
        participant(1, 1, 6_000, true),
        participant(2, 2, 9_000, false),
        participant(3, 3, 8_000, false),
        participant(4, 4, 8_500, false),
        participant(5, 5, 7_000, false),
    ];
    let mut class = RankedClass::new(SCOPE, Some(3), entries);

    class.seed();

    let ids: Vec<_> = class.participants().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 4, 1, 3, 5]);
    assert_eq!(qualified_ids(&class), vec![2, 4, 1]);
    class.check_invariants().expect("invariants");
}

#[test]
fn operations_depend_on_mutation_order() {
    let mut abc = descending_class(10, Some(4));
    abc.withdraw(2).expect("a");
    abc.confirm(2).expect("b");
    abc.withdraw(3).expect("c");

    let mut bac = descending_class(10, Some(4));
    bac.confirm(2).expect("b");
    bac.withdraw(2).expect("a");
    bac.withdraw(3).expect("c");

    assert_eq!(qualified_ids(&abc), vec![1, 2, 4, 5]);
    assert_eq!(qualified_ids(&bac), vec![1, 4, 5, 6]);
    assert_ne!(abc, bac);
}

#[test]
fn unknown_participant_is_rejected() {
    let mut class = descending_class(3, None);

    let err = class.withdraw(42).expect_err("not in class");

    assert_eq!(err, RankingError::NotInClass { participant: 42, scope: SCOPE });
}

#[test]
fn stale_ranks_fail_the_invariant_check() {
    let class = RankedClass::new(SCOPE, Some(2), vec![participant(1, 1, 9_000, false)]);

    assert!(matches!(
        class.check_invariants(),
        Err(RankingError::Invariant { .. })
    ));
}

/// Four regional groups of six, one archer per group without enough scores:
/// 20 participants, 4 of them regional champions, 8 qualifying places.
fn championship_class() -> RankedClass {
    let mut entries = vec![
        participant(1, 1, 9_500, true),
        participant(2, 2, 8_000, true),
        participant(3, 3, 7_000, true),
        participant(4, 4, 6_900, true),
        participant(5, 5, 9_000, false),
        participant(6, 6, 8_900, false),
        participant(7, 7, 8_800, false),
        participant(8, 8, 8_700, false),
    ];
    for (k, id) in (9..=20u64).enumerate() {
        entries.push(participant(id, id as u32, 7_500 - k as u32 * 100, false));
    }
    RankedClass::new(SCOPE, Some(8), entries)
}

fn champions(class: &RankedClass) -> (Vec<u32>, Vec<u32>) {
    let mut champs: Vec<&Participant> =
        class.participants().iter().filter(|p| p.is_champion()).collect();
    champs.sort_by_key(|p| p.order);
    (
        champs.iter().map(|p| p.rank).collect(),
        champs.iter().map(|p| p.order).collect(),
    )
}

#[test]
fn championship_withdrawals_and_cut_changes() {
    let mut class = championship_class();
    class.seed();
    assert_eq!(champions(&class), (vec![1, 6, 7, 8], vec![1, 6, 7, 8]));

    let first = class.withdraw(1).expect("champion withdraws");
    assert_eq!(
        first,
        WithdrawOutcome::Withdrawn { previous_rank: 1, promoted: Some(9) }
    );
    assert_eq!(order_of(&class, 9), 7);

    let second = class.withdraw(6).expect("qualifier withdraws");
    assert_eq!(
        second,
        WithdrawOutcome::Withdrawn { previous_rank: 2, promoted: Some(10) }
    );
    assert_eq!(order_of(&class, 10), 8);
    assert_eq!(champions(&class), (vec![0, 4, 7, 8], vec![1, 6, 9, 10]));

    class.apply_cut(Some(20));
    assert_eq!(class.qualified_count(), 18);
    class.apply_cut(Some(8));

    assert_eq!(champions(&class), (vec![0, 4, 7, 8], vec![1, 6, 9, 10]));
    assert_eq!(rank_of(&class, 9), 5);
    assert_eq!(rank_of(&class, 10), 6);
    class.check_invariants().expect("invariants");
}
