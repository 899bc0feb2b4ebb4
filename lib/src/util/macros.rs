/// Builds a [`Dict`](crate::value::Dict), converting keys and values.
#[doc(hidden)]
#[macro_export]
macro_rules! dict {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut dict: $crate::value::Dict = $crate::value::Dict::new();
        $(dict.insert($key.into(), $crate::value::Value::from($value));)*
        dict
    });
}

pub use dict;

#[cfg(test)]
mod tests {
    use crate::value::Value;

    #[test]
    fn dict_converts_keys_and_values() {
        let dict = dict! { "a" => 1, "b" => "two", "c" => Value::Null };
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get("a"), Some(&Value::Int(1)));
        assert_eq!(dict.get("b").and_then(Value::as_str), Some("two"));
    }

    #[test]
    fn dict_converts_into_a_value() {
        let value = Value::from(dict! { "title" => String::from("Hi"), "count" => 2usize });
        assert_eq!(value.find("title").and_then(Value::as_str), Some("Hi"));
        assert_eq!(value.find("count"), Some(&Value::Int(2)));
    }
}
