#[macro_export]
macro_rules! assert_decimal_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        match (&$left, &$right, &$tolerance) {
            (left_val, right_val, tolerance_val) => {
                let diff = match left_val.checked_sub(*right_val) {
                    Some(result) => result.abs(),
                    None => panic!("Checked subtraction failed"),
                };
                if diff > *tolerance_val {
                    panic!(
                        r#"assertion failed: `(left ≈ right) ± tolerance`
  left: `{:?}`,
 right: `{:?}`,
 diff: `{:?}`,
 tolerance: `{:?}`"#,
                        &*left_val,
                        &*right_val,
                        diff,
                        &*tolerance_val
                    )
                }
            }
        }
    };
}
