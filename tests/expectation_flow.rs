mod common;

use common::{choices, dispatcher_with_session, within};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use turnstile::dispatch::{
    DialogError, DialogResult, Dispatcher, Intent, MeasureUnit, TurnState, Value, ValueCategory,
};

fn answer_for(category: ValueCategory) -> Intent {
    if category == ValueCategory::More {
        return Intent::More;
    }
    let value = match category {
        ValueCategory::YesNo => Value::Boolean(true),
        ValueCategory::MultipleChoice | ValueCategory::Number => Value::Number(0.0),
        ValueCategory::Measure(unit) => Value::Measure {
            value: 1.0,
            unit: unit.symbol().to_string(),
        },
        ValueCategory::PhoneNumber => Value::Entity {
            value: "+15555555555".to_string(),
            display: None,
        },
        _ => Value::String("anything".to_string()),
    };
    Intent::Answer { category, value }
}

/// Task script that asks for each category in turn and reports what it received
async fn expect_each(
    dispatcher: Arc<Dispatcher>,
    categories: Vec<ValueCategory>,
    received: mpsc::UnboundedSender<DialogResult<Intent>>,
) -> DialogResult<()> {
    for category in categories {
        let result = if category == ValueCategory::MultipleChoice {
            dispatcher
                .ask_choices("Pick one", choices(3))
                .await
                .map(|index| Intent::choice(index as f64))
        } else {
            dispatcher.expect(Some(category)).await
        };
        let _ = received.send(result);
    }
    dispatcher.next_intent().await.map(|_| ())
}

async fn assert_answers_pass_through(categories: Vec<ValueCategory>) {
    let (dispatcher, _session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _script = dispatcher.start(|dispatcher| expect_each(dispatcher, categories.clone(), tx));

    for category in &categories {
        let answer = answer_for(*category);
        within(dispatcher.handle(answer.clone())).await.unwrap();

        let received = within(rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, answer, "answer for {category} was not delivered");
    }
    dispatcher.shutdown();
}

#[tokio::test]
async fn every_category_passes_through_to_the_script() {
    assert_answers_pass_through(ValueCategory::ALL.to_vec()).await;
}

proptest! {
    #[test]
    fn answers_pass_through_in_any_order(
        categories in prop::collection::vec(
            prop::sample::select(ValueCategory::ALL.to_vec()),
            1..12,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(assert_answers_pass_through(categories));
    }
}

#[tokio::test]
async fn expectation_is_mirrored_to_the_session() {
    let (dispatcher, session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let category = ValueCategory::Measure(MeasureUnit::C);
    let _script = dispatcher.start(move |dispatcher| expect_each(dispatcher, vec![category], tx));

    within(dispatcher.handle(answer_for(category))).await.unwrap();
    within(rx.recv()).await.unwrap().unwrap();

    let sent = session.sent();
    assert!(sent.contains(&common::Sent::Expect(Some(category))));
    assert!(sent.contains(&common::Sent::AskSpecial(Some(category))));
    // The script is suspended again on a bare next_intent; the slot still reads the last category
    assert_eq!(dispatcher.turn_state(), TurnState::InTurn);
    assert_eq!(dispatcher.expectation().category(), Some(category));
    dispatcher.shutdown();
}

#[tokio::test]
async fn out_of_range_choices_reprompt_without_consuming_the_turn() {
    let (dispatcher, session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let asks = vec![ValueCategory::MultipleChoice; 3];
    let _script = dispatcher.start(move |dispatcher| expect_each(dispatcher, asks, tx));

    for invalid in [3.0, -1.0, 1.5] {
        within(dispatcher.handle(Intent::choice(invalid))).await.unwrap();
        assert!(rx.try_recv().is_err(), "choice {invalid} reached the script");
    }
    assert_eq!(
        session.count_reply("Please click on one of the provided choices."),
        3
    );
    // Three initial options plus three resends of three
    assert_eq!(session.choices_sent(), 12);

    for valid in [0.0, 1.0, 2.0] {
        within(dispatcher.handle(Intent::choice(valid))).await.unwrap();
        let received = within(rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, Intent::choice(valid));
    }
    dispatcher.shutdown();
}

#[tokio::test]
async fn small_talk_help_and_debug_are_answered_in_place() {
    let (dispatcher, session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _script = dispatcher.start(move |dispatcher| {
        expect_each(dispatcher, vec![ValueCategory::Number], tx)
    });

    within(dispatcher.handle(Intent::Hello)).await.unwrap();
    within(dispatcher.handle(Intent::ThankYou)).await.unwrap();
    within(dispatcher.handle(Intent::Help)).await.unwrap();
    within(dispatcher.handle(Intent::Debug)).await.unwrap();
    within(dispatcher.handle(Intent::WakeUp)).await.unwrap();
    assert!(rx.try_recv().is_err());

    assert_eq!(
        session.replies(),
        vec![
            "Hi!",
            "At your service.",
            "Could you give me a number?",
            "I'm not in the default state",
            "I'm expecting a Number",
        ]
    );

    let answer = Intent::Answer {
        category: ValueCategory::Number,
        value: Value::Number(42.0),
    };
    within(dispatcher.handle(answer.clone())).await.unwrap();
    assert_eq!(within(rx.recv()).await.unwrap().unwrap(), answer);
    dispatcher.shutdown();
}

#[tokio::test]
async fn wrong_answers_are_rejected_with_a_reprompt() {
    let (dispatcher, session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _script = dispatcher.start(move |dispatcher| {
        expect_each(dispatcher, vec![ValueCategory::Date], tx)
    });

    within(dispatcher.handle(answer_for(ValueCategory::Number))).await.unwrap();
    within(dispatcher.handle(Intent::Yes)).await.unwrap();
    within(dispatcher.handle(Intent::Failed { utterance: None })).await.unwrap();
    assert!(rx.try_recv().is_err());

    assert_eq!(
        session.replies(),
        vec![
            "Sorry, but that's not what I asked.",
            "Could you give me a date?",
            "Yes what?",
            "Sorry, I did not understand that.",
            "Could you give me a date?",
        ]
    );
    dispatcher.shutdown();
}

#[tokio::test]
async fn measure_reprompt_lists_accepted_units() {
    let (dispatcher, session) = dispatcher_with_session();
    let (tx, _rx) = mpsc::unbounded_channel();
    let category = ValueCategory::Measure(MeasureUnit::Kg);
    let _script = dispatcher.start(move |dispatcher| expect_each(dispatcher, vec![category], tx));

    within(dispatcher.handle(Intent::Help)).await.unwrap();
    assert_eq!(
        session.replies(),
        vec!["I'm looking for a weight in any of the supported units (kg, g, lb, oz)."]
    );
    dispatcher.shutdown();
}

#[tokio::test]
async fn password_prompt_accepts_raw_text() {
    let (dispatcher, _session) = dispatcher_with_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _script = dispatcher.start(move |dispatcher| {
        expect_each(dispatcher, vec![ValueCategory::Password], tx)
    });

    let typed = Intent::Answer {
        category: ValueCategory::RawString,
        value: Value::String("hunter2".to_string()),
    };
    within(dispatcher.handle(typed.clone())).await.unwrap();
    assert!(dispatcher.expectation().is_raw());
    assert_eq!(within(rx.recv()).await.unwrap().unwrap(), typed);
    dispatcher.shutdown();
}

#[tokio::test]
async fn shutdown_fails_the_waiting_script() {
    let (dispatcher, _session) = dispatcher_with_session();
    let (tx, _rx) = mpsc::unbounded_channel();
    let script = dispatcher.start(move |dispatcher| {
        expect_each(dispatcher, vec![ValueCategory::Number], tx)
    });

    within(dispatcher.handle(Intent::Hello)).await.unwrap();
    dispatcher.shutdown();
    within(script).await.unwrap();

    assert!(dispatcher.is_closed());
    assert!(matches!(
        dispatcher.handle(Intent::Hello).await,
        Err(DialogError::Closed)
    ));
}
