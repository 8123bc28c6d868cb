use chrono::NaiveDate;
use obligation_tracker::*;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn recurring(
    id: &str,
    kind: ObligationKind,
    frequency: Frequency,
    anchor: Option<NaiveDate>,
) -> RecurringObligation {
    RecurringObligation {
        id: id.to_string(),
        name: id.to_string(),
        kind,
        amount: 1500.0,
        frequency,
        anchor_date: anchor,
        anchor_kind: AnchorKind::StartDate,
        semi_monthly_first_day: None,
        semi_monthly_second_day: None,
        end_date: None,
    }
}

fn household() -> Vec<Obligation> {
    let mut paycheck = recurring(
        "paycheck",
        ObligationKind::Income,
        Frequency::SemiMonthly,
        Some(d(2023, 9, 1)),
    );
    paycheck.amount = 2200.0;
    paycheck.semi_monthly_first_day = Some(1);
    paycheck.semi_monthly_second_day = Some(15);

    let mut streaming = recurring(
        "streaming",
        ObligationKind::Subscription,
        Frequency::Monthly,
        Some(d(2023, 12, 12)),
    );
    streaming.amount = 15.99;
    streaming.anchor_kind = AnchorKind::LastRenewal;

    let mut gym = recurring(
        "gym",
        ObligationKind::FixedExpense,
        Frequency::Monthly,
        Some(d(2023, 3, 5)),
    );
    gym.amount = 45.0;
    gym.end_date = Some(d(2024, 2, 29));

    vec![
        Obligation::Recurring(recurring(
            "rent",
            ObligationKind::FixedExpense,
            Frequency::Monthly,
            Some(d(2023, 1, 1)),
        )),
        Obligation::Recurring(paycheck),
        Obligation::Recurring(streaming),
        Obligation::Recurring(gym),
        Obligation::Debt(DebtAccount {
            id: "visa".to_string(),
            name: "Visa".to_string(),
            amount: 120.0,
            payment_day_of_month: Some(28),
            next_due_date: Some(d(2024, 6, 28)),
            payment_frequency: Frequency::Monthly,
            end_date: None,
        }),
    ]
}

#[test]
fn test_monthly_example() {
    let rent = Obligation::Recurring(recurring(
        "rent",
        ObligationKind::FixedExpense,
        Frequency::Monthly,
        Some(d(2024, 1, 1)),
    ));
    let dates = expand(&rent, DateWindow::new(d(2024, 1, 1), d(2024, 4, 1)));
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1), d(2024, 4, 1)]);
}

#[test]
fn test_semi_monthly_example() {
    let mut pay = recurring("pay", ObligationKind::FixedExpense, Frequency::SemiMonthly, None);
    pay.semi_monthly_first_day = Some(1);
    pay.semi_monthly_second_day = Some(15);
    let dates = expand(&Obligation::Recurring(pay), DateWindow::new(d(2024, 1, 1), d(2024, 2, 1)));
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 15)]);
}

#[test]
fn test_end_date_example() {
    let mut rent = recurring(
        "rent",
        ObligationKind::FixedExpense,
        Frequency::Monthly,
        Some(d(2024, 1, 1)),
    );
    rent.end_date = Some(d(2024, 2, 15));
    let dates = expand(&Obligation::Recurring(rent), DateWindow::new(d(2024, 1, 1), d(2024, 4, 1)));
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 2, 1)]);
}

#[test]
fn test_debt_backward_alignment_example() {
    let visa = Obligation::Debt(DebtAccount {
        id: "visa".to_string(),
        name: "Visa".to_string(),
        amount: 120.0,
        payment_day_of_month: Some(28),
        next_due_date: Some(d(2024, 3, 28)),
        payment_frequency: Frequency::Monthly,
        end_date: None,
    });
    let dates = expand(&visa, DateWindow::new(d(2024, 2, 1), d(2024, 2, 29)));
    assert_eq!(dates, vec![d(2024, 2, 28)]);
}

#[test]
fn test_expansion_determinism_across_household() {
    let window = DateWindow::new(d(2024, 1, 1), d(2024, 12, 31));
    for obligation in household() {
        let first = expand(&obligation, window);
        let second = expand(&obligation, window);
        assert_eq!(first, second);
        assert!(
            first.windows(2).all(|pair| pair[0] < pair[1]),
            "{} not strictly sorted",
            obligation.reference()
        );
    }
}

#[test]
fn test_reconciled_periods_are_never_completed_and_overdue() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let obligations = household();
    let today = d(2024, 7, 9);

    tracker.mark_complete("u1", obligations[0].reference(), d(2024, 5, 1), d(2024, 5, 2), None)?;
    tracker.mark_complete("u1", obligations[4].reference(), d(2024, 6, 28), d(2024, 6, 27), None)?;

    let periods = tracker.reconcile(
        "u1",
        &obligations,
        DateWindow::new(d(2024, 1, 1), d(2024, 9, 30)),
        Some(d(2024, 4, 1)),
        today,
    )?;

    assert!(!periods.is_empty());
    for period in &periods {
        assert!(!(period.is_completed && period.is_overdue));
        if period.period_date() < d(2024, 4, 1) {
            assert!(period.is_completed && period.auto_completed);
        }
        if period.is_overdue {
            assert_eq!(
                period.days_past_due,
                Some((today - period.period_date()).num_days())
            );
        }
    }
    assert!(periods.windows(2).all(|pair| pair[0].period_date() <= pair[1].period_date()));
    Ok(())
}

#[test]
fn test_tracking_start_beats_unmark() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let obligations = household();
    let rent = obligations[0].reference();
    let tracking_start = Some(d(2024, 3, 1));

    // A real record on an auto-completed period supersedes the virtual one.
    let tx = Some("tx-feb".to_string());
    tracker.mark_complete("u1", rent.clone(), d(2024, 2, 1), d(2024, 2, 3), tx)?;
    let periods = tracker.reconcile(
        "u1",
        std::slice::from_ref(&obligations[0]),
        DateWindow::new(d(2024, 2, 1), d(2024, 2, 1)),
        tracking_start,
        d(2024, 3, 10),
    )?;
    assert_eq!(periods[0].completed_date, Some(d(2024, 2, 3)));
    assert_eq!(periods[0].linked_transaction_id.as_deref(), Some("tx-feb"));
    assert!(periods[0].auto_completed);

    assert!(tracker.unmark_complete("u1", rent.clone(), d(2024, 2, 1))?);
    assert!(!tracker.unmark_complete("u1", rent, d(2024, 2, 1))?);

    let periods = tracker.reconcile(
        "u1",
        std::slice::from_ref(&obligations[0]),
        DateWindow::new(d(2024, 2, 1), d(2024, 2, 1)),
        tracking_start,
        d(2024, 3, 10),
    )?;
    assert!(periods[0].is_completed);
    assert_eq!(periods[0].completed_date, Some(d(2024, 2, 1)));
    Ok(())
}

#[test]
fn test_upsert_idempotence_with_different_links() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let visa = ObligationRef::Debt("visa".to_string());

    let due = d(2024, 5, 28);
    tracker.mark_complete("u1", visa.clone(), due, due, Some("tx-1".to_string()))?;
    tracker.mark_complete("u1", visa.clone(), due, d(2024, 5, 29), Some("tx-2".to_string()))?;

    let records = tracker.ledger().find_in_range("u1", d(2024, 5, 1), d(2024, 5, 31))?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].linked_transaction_id.as_deref(), Some("tx-2"));

    // The first link no longer points at anything.
    assert_eq!(tracker.remove_by_linked_transaction("tx-1")?, 0);
    assert_eq!(tracker.remove_by_linked_transaction("tx-2")?, 1);
    Ok(())
}

#[test]
fn test_backfill_idempotence() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let obligations = household();
    let today = d(2024, 7, 9);

    let first = tracker.change_tracking_start("u1", &obligations, d(2024, 5, 1), today)?;
    assert!(first > 0);
    let second = tracker.change_tracking_start("u1", &obligations, d(2024, 5, 1), today)?;
    assert_eq!(second, 0);
    assert_eq!(tracker.ledger().len()?, first);

    // Backfilled rows line up with reconciled periods, business-day shifts included.
    let periods = tracker.reconcile(
        "u1",
        &obligations,
        DateWindow::new(d(2024, 1, 1), d(2024, 4, 30)),
        None,
        today,
    )?;
    assert!(periods.iter().all(|p| p.is_completed && !p.auto_completed));
    assert_eq!(periods.len(), first);
    Ok(())
}

#[test]
fn test_backfill_is_scoped_per_user() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let obligations = household();
    let inserted_u1 = tracker.backfill("u1", &obligations, d(2024, 3, 1))?;
    let inserted_u2 = tracker.backfill("u2", &obligations, d(2024, 3, 1))?;
    assert_eq!(inserted_u1, inserted_u2);
    assert_eq!(tracker.ledger().len()?, inserted_u1 * 2);
    Ok(())
}

#[test]
fn test_overdue_widget_and_period_picker() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let obligations = household();
    let tracking_start = Some(d(2024, 6, 1));
    let today = d(2024, 7, 9);

    let overdue = tracker.overdue("u1", &obligations, tracking_start, today)?;
    let summary = OverdueSummary::from_periods(&overdue);
    assert_eq!(summary.count, overdue.len());
    assert!(overdue.iter().all(|p| p.period_date() >= d(2024, 6, 1) && p.period_date() < today));

    let visa = &obligations[4];
    let selection = tracker.period_selection("u1", visa, tracking_start, today);
    assert!(selection.enabled);
    assert_eq!(selection.selected, Some(d(2024, 6, 28)));

    let tx = Some("tx-visa".to_string());
    tracker.mark_complete("u1", visa.reference(), d(2024, 6, 28), d(2024, 7, 1), tx)?;
    let selection = tracker.period_selection("u1", visa, tracking_start, today);
    assert_eq!(selection.selected, Some(d(2024, 7, 28)));

    let removed = tracker.remove_transaction_with("tx-visa", |_| Ok::<(), String>(()))?;
    assert_eq!(removed, 1);
    let selection = tracker.period_selection("u1", visa, tracking_start, today);
    assert_eq!(selection.selected, Some(d(2024, 6, 28)));
    Ok(())
}

#[test]
fn test_obligations_from_collaborator_payload() -> anyhow::Result<()> {
    let payload = r#"{
        "obligations": [
            {
                "source": "recurring",
                "id": "salary",
                "kind": "income",
                "amount": 3000,
                "frequency": "monthly",
                "anchor_date": "2024-01-15"
            },
            {
                "source": "recurring",
                "id": "mystery",
                "kind": "fixed-expense",
                "amount": 10,
                "frequency": "every-blue-moon",
                "anchor_date": "2024-01-03"
            }
        ]
    }"#;
    let set = ObligationSet::from_json_str(payload)?;
    let config =
        EngineConfig::from_json_str(r#"{ "business_calendar": { "holidays": ["2024-01-15"] } }"#)?;
    let tracker = ObligationTracker::new(config, InMemoryLedger::new())?;

    let window = DateWindow::new(d(2024, 1, 1), d(2024, 3, 31));
    let periods = tracker.reconcile("u1", &set.obligations, window, None, d(2024, 1, 2))?;
    let salary: Vec<NaiveDate> = periods
        .iter()
        .filter(|p| p.period.obligation == ObligationRef::Recurring("salary".to_string()))
        .map(|p| p.period_date())
        .collect();
    // Jan 15 is a configured holiday; Feb 15 and Mar 15 are weekdays.
    assert_eq!(salary, vec![d(2024, 1, 12), d(2024, 2, 15), d(2024, 3, 15)]);

    let mystery = periods
        .iter()
        .filter(|p| p.period.obligation == ObligationRef::Recurring("mystery".to_string()))
        .count();
    assert_eq!(mystery, 3);
    Ok(())
}

#[test]
fn test_last_renewal_subscription_is_not_overdue_on_its_anchor() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
    let mut music = recurring(
        "music",
        ObligationKind::Subscription,
        Frequency::Monthly,
        Some(d(2024, 1, 15)),
    );
    music.anchor_kind = AnchorKind::LastRenewal;
    let music = vec![Obligation::Recurring(music)];

    assert!(tracker.overdue("u1", &music, None, d(2024, 2, 1))?.is_empty());

    let overdue = tracker.overdue("u1", &music, None, d(2024, 2, 20))?;
    let dates: Vec<NaiveDate> = overdue.iter().map(|p| p.period_date()).collect();
    assert_eq!(dates, vec![d(2024, 2, 15)]);
    Ok(())
}

#[cfg(feature = "sqlite")]
#[test]
fn test_sqlite_ledger_backfill_and_reconcile() -> anyhow::Result<()> {
    let tracker = ObligationTracker::new(EngineConfig::default(), SqliteLedger::open_in_memory()?)?;
    let obligations = household();
    let today = d(2024, 7, 9);

    let inserted = tracker.change_tracking_start("u1", &obligations, d(2024, 5, 1), today)?;
    assert!(inserted > 0);
    assert_eq!(tracker.change_tracking_start("u1", &obligations, d(2024, 5, 1), today)?, 0);

    let rent = obligations[0].reference();
    let june = d(2024, 6, 1);
    tracker.mark_complete("u1", rent.clone(), june, june, Some("tx-r".to_string()))?;
    tracker.mark_complete("u1", rent, june, d(2024, 6, 2), Some("tx-r2".to_string()))?;

    let periods = tracker.reconcile(
        "u1",
        std::slice::from_ref(&obligations[0]),
        DateWindow::new(d(2024, 6, 1), d(2024, 6, 1)),
        None,
        today,
    )?;
    assert_eq!(periods[0].linked_transaction_id.as_deref(), Some("tx-r2"));
    assert_eq!(tracker.remove_by_linked_transaction("tx-r2")?, 1);
    Ok(())
}
