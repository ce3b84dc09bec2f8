use chrono::Utc;
use star_ratings_be::errors::AppError;
use star_ratings_be::models::rating::{format_average, rounded_average};
use star_ratings_be::models::{Rating, RatingEvent};

fn new_rating() -> Rating {
    Rating {
        id: 1,
        target_kind: "article".into(),
        target_id: 7,
        total_rating: 0,
        total_votes: 0,
        avg_rating: 0.0,
        percent: 0.0,
        created: Utc::now(),
        updated: Utc::now(),
    }
}

fn new_event(ip: &str) -> RatingEvent {
    RatingEvent {
        id: 1,
        target_kind: "article".into(),
        target_id: 7,
        ip: ip.into(),
        user_id: None,
        value: 0,
        created: Utc::now(),
        updated: Utc::now(),
        is_changing: false,
        old_value: 0,
    }
}

// Mirrors the protocol step: snapshot the prior value, mark the event as
// changing when one existed, then apply.
fn cast(rating: &mut Rating, event: &mut RatingEvent, value: i32) {
    if event.value > 0 {
        event.is_changing = true;
        event.old_value = event.value;
    } else {
        event.is_changing = false;
        event.old_value = 0;
    }
    event.value = value;
    rating.add_rating(event).expect("vote should apply");
}

#[test]
fn test_first_vote_sets_counters() {
    let mut rating = new_rating();
    let mut event = new_event("127.0.0.1");

    cast(&mut rating, &mut event, 80);

    assert_eq!(rating.total_votes, 1);
    assert_eq!(rating.total_rating, 80);
    assert_eq!(rating.avg_rating, 4.0);
    assert_eq!(rating.percent, 0.8);
}

#[test]
fn test_revote_does_not_change_total_votes() {
    let mut rating = new_rating();
    let mut event = new_event("127.0.0.1");

    cast(&mut rating, &mut event, 80);
    cast(&mut rating, &mut event, 40);

    assert_eq!(rating.total_votes, 1);
    assert_eq!(rating.total_rating, 40);
    assert_eq!(rating.avg_rating, 2.0);
}

#[test]
fn test_revote_moves_sum_by_difference() {
    let mut rating = new_rating();
    let mut event = new_event("127.0.0.1");

    cast(&mut rating, &mut event, 60);
    let before = rating.total_rating;
    cast(&mut rating, &mut event, 100);

    assert_eq!(rating.total_rating - before, 100 - 60);
    assert_eq!(rating.total_votes, 1);
}

#[test]
fn test_distinct_voters_each_count_once() {
    let mut rating = new_rating();

    for (i, value) in [20, 40, 60, 80, 100].into_iter().enumerate() {
        let mut event = new_event(&format!("10.0.0.{}", i));
        cast(&mut rating, &mut event, value);
    }

    assert_eq!(rating.total_votes, 5);
    assert_eq!(rating.total_rating, 300);
    assert_eq!(rating.avg_rating, 3.0);
    assert_eq!(rating.percent, 0.6);
}

#[test]
fn test_vote_then_change_then_second_voter() {
    // The end-to-end scenario: 90 by user A, then A changes to 50, then 40
    // by user B. With half-to-even rounding (50 + 40) / 2 / 20 = 2.25 -> 2.2.
    let mut rating = new_rating();
    let mut event_a = new_event("10.0.0.1");
    let mut event_b = new_event("10.0.0.2");

    cast(&mut rating, &mut event_a, 90);
    assert_eq!(rating.total_votes, 1);
    assert_eq!(rating.avg_rating, 4.5);

    cast(&mut rating, &mut event_a, 50);
    assert_eq!(rating.total_votes, 1);
    assert_eq!(rating.avg_rating, 2.5);

    cast(&mut rating, &mut event_b, 40);
    assert_eq!(rating.total_votes, 2);
    assert_eq!(rating.total_rating, 90);
    assert_eq!(rating.avg_rating, 2.2);
}

#[test]
fn test_rounded_average_half_to_even() {
    // Exact values stay exact
    assert_eq!(rounded_average(90, 1), 4.5);
    assert_eq!(rounded_average(50, 1), 2.5);
    assert_eq!(rounded_average(300, 5), 3.0);

    // Ties round to the even tenth
    assert_eq!(rounded_average(130, 2), 3.2); // 3.25
    assert_eq!(rounded_average(90, 2), 2.2); // 2.25
    assert_eq!(rounded_average(110, 2), 2.8); // 2.75

    // No votes yet
    assert_eq!(rounded_average(0, 0), 0.0);
}

#[test]
fn test_format_average_one_fractional_digit() {
    assert_eq!(format_average(4.5), "4.5");
    assert_eq!(format_average(0.0), "0.0");
    assert_eq!(format_average(2.2), "2.2");
    assert_eq!(format_average(3.0), "3.0");
}

#[test]
fn test_negative_average_is_rejected_not_clamped() {
    let mut rating = new_rating();
    let mut first = new_event("127.0.0.1");
    cast(&mut rating, &mut first, 20);

    // A corrupted old value drags the sum below zero; applying must fail.
    let mut bogus = new_event("127.0.0.1");
    bogus.value = 20;
    bogus.is_changing = true;
    bogus.old_value = 80;

    let result = rating.add_rating(&bogus);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn test_negative_percent_fails_validation() {
    let mut rating = new_rating();
    rating.percent = -0.5;

    assert!(matches!(rating.validate(), Err(AppError::Validation(_))));
}

#[test]
fn test_negative_avg_fails_validation() {
    let mut rating = new_rating();
    rating.avg_rating = -5.5;

    assert!(matches!(rating.validate(), Err(AppError::Validation(_))));
}
