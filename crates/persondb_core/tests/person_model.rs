use persondb_core::Person;
use serde_json::json;

#[test]
fn serialization_omits_absent_fields_and_password() {
    let mut person = Person::new(1, "Otabek", "otabek94_30@mail.ru");
    person.password = Some("hunter2".to_string());

    let value = serde_json::to_value(&person).unwrap();

    assert_eq!(
        value,
        json!({"id": 1, "name": "Otabek", "email": "otabek94_30@mail.ru"})
    );
}

#[test]
fn deserialization_fills_missing_optional_fields() {
    let person: Person = serde_json::from_value(json!({
        "id": 2,
        "name": "Ilyosbek",
        "email": "ilyosbek@mail.ru",
        "role": 4
    }))
    .unwrap();

    assert_eq!(person.id, 2);
    assert_eq!(person.role, Some(4));
    assert_eq!(person.surname, None);
    assert_eq!(person.password, None);
}
