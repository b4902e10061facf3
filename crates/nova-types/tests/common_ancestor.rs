use nova_types::{
    ChainTypeLoader, MinimalJdk, TypeHandle, TypeInfo, TypeKind, TypeLoadError, TypeLoader,
    TypeResolver,
};
use pretty_assertions::assert_eq;

struct Zoo;

impl TypeLoader for Zoo {
    fn load_type(&self, name: &str) -> Result<TypeInfo, TypeLoadError> {
        match name {
            "zoo.Animal" => Ok(TypeInfo::class(name, None, &[])),
            "zoo.Pet" => Ok(TypeInfo::interface(name, &[])),
            "zoo.Dog" => Ok(TypeInfo::class(name, Some("zoo.Animal"), &["zoo.Pet"])),
            "zoo.Cat" => Ok(TypeInfo::class(name, Some("zoo.Animal"), &["zoo.Pet"])),
            "zoo.Puppy" => Ok(TypeInfo::class(name, Some("zoo.Dog"), &[])),
            "zoo.Rock" => Ok(TypeInfo::class(name, None, &[])),
            // Superclass is declared but cannot be loaded.
            "zoo.Orphan" => Ok(TypeInfo::class(name, Some("zoo.Gone"), &["zoo.Pet"])),
            _ => Err(TypeLoadError::NotFound(name.to_string())),
        }
    }
}

fn resolver() -> TypeResolver<ChainTypeLoader<'static>> {
    TypeResolver::new(ChainTypeLoader::new(vec![
        Box::new(Zoo),
        Box::new(MinimalJdk::new()),
    ]))
}

fn class(name: &str) -> TypeHandle {
    TypeHandle::new(name, TypeKind::Class)
}

#[test]
fn empty_and_singleton_sets() {
    let r = resolver();
    assert_eq!(r.common_ancestor(&[]), TypeHandle::object());
    assert_eq!(r.common_ancestor(&[class("zoo.Dog")]), class("zoo.Dog"));
    assert_eq!(
        r.common_ancestor(&[class("zoo.Dog"), class("zoo.Dog")]),
        class("zoo.Dog")
    );
}

#[test]
fn first_surviving_supertype_in_closure_order_wins() {
    let r = resolver();
    // Dog's closure is [Dog, Pet, Animal]: Pet is reached before the superclass.
    assert_eq!(
        r.common_ancestor(&[class("zoo.Dog"), class("zoo.Cat")]).name(),
        "zoo.Pet"
    );
    assert_eq!(
        r.common_ancestor(&[class("zoo.Puppy"), class("zoo.Dog")]).name(),
        "zoo.Dog"
    );
    assert_eq!(
        r.common_ancestor(&[class("zoo.Dog"), class("zoo.Puppy"), class("zoo.Cat")])
            .name(),
        "zoo.Pet"
    );
}

#[test]
fn unrelated_types_meet_at_object() {
    let r = resolver();
    assert!(r
        .common_ancestor(&[class("zoo.Dog"), class("zoo.Rock")])
        .is_object());
    assert!(r
        .common_ancestor(&[TypeHandle::new("int", TypeKind::Primitive), class("zoo.Dog")])
        .is_object());
}

#[test]
fn pairs_are_symmetric() {
    let r = resolver();
    let pairs = [
        ("zoo.Dog", "zoo.Cat"),
        ("zoo.Puppy", "zoo.Cat"),
        ("java.util.ArrayList", "java.util.LinkedList"),
        ("java.util.HashSet", "java.util.ArrayList"),
        ("java.lang.Integer", "java.lang.Long"),
        ("java.lang.String", "java.lang.StringBuilder"),
        ("zoo.Rock", "zoo.Animal"),
    ];
    for (a, b) in pairs {
        let (a, b) = (class(a), class(b));
        assert_eq!(
            r.common_ancestor(&[a.clone(), b.clone()]),
            r.common_ancestor(&[b.clone(), a.clone()]),
            "{a} / {b}"
        );
    }
}

#[test]
fn jdk_ancestors() {
    let r = resolver();
    let ancestor = |a: &str, b: &str| r.common_ancestor(&[class(a), class(b)]).name().to_string();
    assert_eq!(ancestor("java.util.ArrayList", "java.util.LinkedList"), "java.util.List");
    assert_eq!(ancestor("java.util.HashSet", "java.util.ArrayList"), "java.util.Collection");
    assert_eq!(ancestor("java.lang.Integer", "java.lang.Long"), "java.lang.Comparable");
    assert_eq!(ancestor("java.lang.Integer", "java.math.BigDecimal"), "java.lang.Comparable");
}

#[test]
fn unloadable_superclasses_prune_the_walk() {
    let r = resolver();
    let orphan = class("zoo.Orphan");
    let names: Vec<_> = r
        .supertypes(&orphan)
        .iter()
        .map(|h| h.name().to_string())
        .collect();
    assert_eq!(names, vec!["zoo.Orphan", "zoo.Pet", "zoo.Gone"]);
    assert_eq!(
        r.common_ancestor(&[orphan, class("zoo.Cat")]).name(),
        "zoo.Pet"
    );
}
