use std::cmp::Ordering;

use proptest::prelude::*;

use phonebill::{
    bill::PhoneBill,
    call::{call_order, PhoneCall},
    codec::{self, CodecError},
    search::TimeRange,
};

fn stamp(day: u32, minute_of_day: u32) -> String {
    let hour24 = minute_of_day / 60;
    let minute = minute_of_day % 60;
    let (hour12, meridiem) = match hour24 {
        0 => (12, "AM"),
        h @ 1..=11 => (h, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    };
    format!("03/{day:02}/2021 {hour12}:{minute:02} {meridiem}")
}

fn call_strategy() -> impl Strategy<Value = PhoneCall> {
    (0u16..40, 1u32..4, 0u32..1440, 0u32..240).prop_map(|(caller, day, minute, length)| {
        let end_minute = (minute + length).min(1439);
        PhoneCall::new(
            &format!("503-555-{caller:04}"),
            "971-555-0123",
            &stamp(day, minute),
            &stamp(day, end_minute),
        )
        .expect("generated call is valid")
    })
}

fn customer_strategy() -> impl Strategy<Value = String> {
    "[^\\r\\n]{0,24}"
}

fn bill_strategy() -> impl Strategy<Value = PhoneBill> {
    (customer_strategy(), prop::collection::vec(call_strategy(), 0..40)).prop_map(|(customer, calls)| {
        let mut bill = PhoneBill::new(customer);
        for call in calls {
            bill.add_call(call);
        }
        bill
    })
}

proptest! {
    #[test]
    fn ordering_is_antisymmetric_and_transitive(a in call_strategy(), b in call_strategy(), c in call_strategy()) {
        prop_assert_eq!(call_order(&a, &b), call_order(&b, &a).reverse());
        if call_order(&a, &b) != Ordering::Greater && call_order(&b, &c) != Ordering::Greater {
            prop_assert_ne!(call_order(&a, &c), Ordering::Greater);
        }
        let equal = call_order(&a, &b) == Ordering::Equal;
        let same_keys = a.start().instant() == b.start().instant()
            && a.caller().numeric_value() == b.caller().numeric_value();
        prop_assert_eq!(equal, same_keys);
    }

    #[test]
    fn sorting_is_idempotent_and_ordered(bill in bill_strategy()) {
        let mut once = bill.clone();
        once.sort();
        for pair in once.calls().windows(2) {
            prop_assert_ne!(call_order(&pair[0], &pair[1]), Ordering::Greater);
        }
        let mut twice = once.clone();
        twice.sort();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn text_round_trip_preserves_raw_fields(bill in bill_strategy()) {
        let mut text = Vec::new();
        codec::dump(&bill, &mut text).expect("dump");
        let decoded = codec::parse(text.as_slice()).expect("parse");
        prop_assert_eq!(decoded.customer(), bill.customer());
        prop_assert_eq!(decoded.calls().len(), bill.calls().len());
        for (d, o) in decoded.calls().iter().zip(bill.calls()) {
            prop_assert_eq!(d.caller().as_str(), o.caller().as_str());
            prop_assert_eq!(d.callee().as_str(), o.callee().as_str());
            prop_assert_eq!(d.start().as_str(), o.start().as_str());
            prop_assert_eq!(d.end().as_str(), o.end().as_str());
        }
    }

    #[test]
    fn customer_names_with_line_breaks_are_refused(
        head in customer_strategy(),
        brk in prop::sample::select(vec!["\n", "\r", "\r\n"]),
        tail in customer_strategy(),
    ) {
        let name = format!("{head}{brk}{tail}");
        let bill = PhoneBill::new(name.clone());
        let err = codec::dump(&bill, Vec::new()).expect_err("multi-line name must be refused");
        prop_assert!(matches!(err, CodecError::InvalidCustomer(ref rejected) if *rejected == name));
    }

    #[test]
    fn range_search_matches_full_scan(bill in bill_strategy(), day in 1u32..4, lo in 0u32..1440, span in 0u32..600) {
        let hi = (lo + span).min(1439);
        let range = TimeRange::parse(&stamp(day, lo), &stamp(day, hi)).expect("range");
        let found = bill.calls_in_range(&range);
        let expected: Vec<&PhoneCall> = bill
            .calls()
            .iter()
            .filter(|c| {
                let s = c.start().instant();
                range.lower.instant() <= s && s <= range.upper.instant()
            })
            .collect();
        prop_assert_eq!(found, expected);
    }
}
