//! 末尾の `KEY VALUE KEY VALUE ...` を組にする

use herald_core::domain::TaskArguments;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("keyword `{key}` (pair {position}) has no value")]
pub struct DanglingKeyword {
    pub position: usize,
    pub key: String,
}

/// Split trailing words into (key, value) pairs, keeping their order.
pub fn pair_extras(words: &[String]) -> Result<Vec<(String, String)>, DanglingKeyword> {
    words
        .chunks(2)
        .enumerate()
        .map(|(i, chunk)| match chunk {
            [key, value] => Ok((key.clone(), value.clone())),
            dangling => Err(DanglingKeyword {
                position: i + 1,
                key: dangling.concat(),
            }),
        })
        .collect()
}

/// Later pairs win when a key repeats.
pub fn into_arguments(pairs: Vec<(String, String)>) -> TaskArguments {
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn words(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&["port", "5555"], 1)]
    #[case(&["port", "5555", "host", "db"], 2)]
    fn even_counts_pair_up(#[case] raw: &[&str], #[case] expected: usize) {
        assert_eq!(pair_extras(&words(raw)).unwrap().len(), expected);
    }

    #[rstest]
    #[case(&["port"], 1, "port")]
    #[case(&["port", "5555", "host"], 2, "host")]
    fn odd_counts_report_dangling_key(
        #[case] raw: &[&str],
        #[case] position: usize,
        #[case] key: &str,
    ) {
        let err = pair_extras(&words(raw)).unwrap_err();
        assert_eq!(err.position, position);
        assert_eq!(err.key, key);
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let pairs = pair_extras(&words(&["a", "1", "b", "2", "a", "3"])).unwrap();
        let args = into_arguments(pairs);
        assert_eq!(args.len(), 2);
        assert_eq!(args["a"], "3");
    }
}
