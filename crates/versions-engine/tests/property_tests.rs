//! Fork numbering holds for arbitrary update sequences

mod common;

use common::{count, pages, setup};
use proptest::prelude::*;
use versions_core::attrs;

#[derive(Debug, Clone)]
enum Step {
    Change,
    Repeat,
    DropCurrent,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => Just(Step::Change),
        2 => Just(Step::Repeat),
        1 => Just(Step::DropCurrent),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_changes_add_exactly_one_version_each(titles in prop::collection::vec("[a-w]{1,8}", 1..12)) {
        let fx = setup();
        let pages = pages(&fx);
        let mut page = pages.create(&fx.tx, attrs! {}, attrs! { "title" => "start" }).unwrap();

        let mut expected = 1;
        let mut last = String::from("start");
        for title in titles {
            let updated = pages.update_version(&fx.tx, &mut page, attrs! { "title" => title.as_str() }).unwrap();
            prop_assert!(updated);
            if title != last {
                expected += 1;
            }
            last = title;
            prop_assert_eq!(count(&fx.tx, "versions"), expected);
            prop_assert_eq!(pages.version(&fx.tx, &mut page).unwrap().number(), Some(expected));
        }
    }

    #[test]
    fn prop_numbers_strictly_increase_and_are_never_reused(steps in prop::collection::vec(step(), 1..16)) {
        let fx = setup();
        let pages = pages(&fx);
        let mut page = pages.create(&fx.tx, attrs! {}, attrs! { "title" => "t0" }).unwrap();

        let mut issued = vec![1_i64];
        for (i, step) in steps.into_iter().enumerate() {
            let live = pages.count_versions(&fx.tx, &page).unwrap();
            match step {
                Step::Change => {
                    let title = format!("t{}", i + 1);
                    let updated = pages.update_version(&fx.tx, &mut page, attrs! { "title" => title }).unwrap();
                    prop_assert!(updated);
                    let number = pages.version(&fx.tx, &mut page).unwrap().number().unwrap();
                    prop_assert!(issued.iter().all(|n| *n < number));
                    issued.push(number);
                }
                Step::Repeat => {
                    let before = pages.version(&fx.tx, &mut page).unwrap().number();
                    prop_assert!(pages.save(&fx.tx, &mut page).unwrap());
                    prop_assert_eq!(pages.version(&fx.tx, &mut page).unwrap().number(), before);
                    prop_assert_eq!(pages.count_versions(&fx.tx, &page).unwrap(), live);
                }
                Step::DropCurrent if live > 1 => {
                    let updated = pages.update_version(&fx.tx, &mut page, attrs! { "__destroy" => true }).unwrap();
                    prop_assert!(updated);
                    prop_assert_eq!(pages.count_versions(&fx.tx, &page).unwrap(), live - 1);
                }
                Step::DropCurrent => {}
            }
        }
    }
}
