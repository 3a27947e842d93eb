//! Tests for the buyer model.

use super::*;
use rstest::rstest;
use serde_json::json;

fn ada() -> UserProfile {
    UserProfile::try_new("Ada", "", "Lovelace", Gender::Female, 36).expect("valid profile")
}

#[rstest]
#[case("", "Lovelace", "first name")]
#[case("Ada", "   ", "last name")]
fn blank_required_names_are_rejected(
    #[case] first: &str,
    #[case] last: &str,
    #[case] field: &'static str,
) {
    let result = UserProfile::try_new(first, "", last, Gender::Female, 30);
    assert_eq!(result, Err(UserValidationError::EmptyName { field }));
}

#[rstest]
fn overlong_names_are_rejected() {
    let result = UserProfile::try_new(
        "Ada",
        "x".repeat(NAME_MAX + 1),
        "Lovelace",
        Gender::Female,
        30,
    );
    assert_eq!(
        result,
        Err(UserValidationError::NameTooLong {
            field: "middle name",
            max: NAME_MAX,
        })
    );
}

#[rstest]
#[case("", "Ada Lovelace")]
#[case("King", "Ada King Lovelace")]
fn full_name_skips_empty_middle_name(#[case] middle: &str, #[case] expected: &str) {
    let profile = UserProfile::try_new(" Ada ", middle, "Lovelace", Gender::Female, 36)
        .expect("valid profile");
    assert_eq!(profile.full_name(), expected);
}

#[rstest]
#[case("ab", UserValidationError::UsernameLength { min: USERNAME_MIN, max: USERNAME_MAX })]
#[case("ada_l", UserValidationError::UsernameInvalidCharacters)]
#[case("ada lovelace", UserValidationError::UsernameInvalidCharacters)]
fn invalid_usernames_are_rejected(#[case] raw: &str, #[case] expected: UserValidationError) {
    assert_eq!(Username::new(raw), Err(expected));
}

#[rstest]
#[case("F", Gender::Female)]
#[case("M", Gender::Male)]
fn gender_codes_parse(#[case] code: &str, #[case] expected: Gender) {
    assert_eq!(code.parse::<Gender>(), Ok(expected));
    assert_eq!(expected.as_code(), code);
}

#[rstest]
fn unknown_gender_code_is_rejected() {
    assert_eq!("X".parse::<Gender>(), Err(UserValidationError::InvalidGender));
}

#[rstest]
fn serialises_profile_fields_inline() {
    let username = Username::new("ada").expect("username");
    let user = User::new(UserId::random(), username, ada(), Money::new(250).expect("balance"));
    let value = serde_json::to_value(&user).expect("serialise user");

    assert_eq!(value["username"], "ada");
    assert_eq!(value["firstName"], "Ada");
    assert_eq!(value["gender"], "F");
    assert_eq!(value["age"], 36);
    assert_eq!(value["balance"], 250);
}

#[rstest]
#[case(json!({"firstName": "  ", "lastName": "Lovelace", "gender": "F", "age": 36}))]
#[case(json!({"firstName": "Ada", "lastName": "Lovelace", "gender": "X", "age": 36}))]
fn profile_deserialisation_enforces_validation(#[case] payload: serde_json::Value) {
    let result = serde_json::from_value::<UserProfile>(payload);
    assert!(result.is_err(), "accepted invalid profile: {result:?}");
}

#[rstest]
fn registration_payload_validates_username() {
    let payload = json!({
        "username": "no spaces",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "gender": "F",
        "age": 36,
        "balance": 100,
    });
    assert!(serde_json::from_value::<NewUser>(payload).is_err());
}

#[rstest]
fn registration_payload_round_trips() {
    let new_user = NewUser::new(
        Username::new("ada").expect("username"),
        ada(),
        Money::new(100).expect("balance"),
    );
    let value = serde_json::to_value(&new_user).expect("serialise");
    let decoded: NewUser = serde_json::from_value(value).expect("deserialise");
    assert_eq!(decoded, new_user);
}
