use indoc::indoc;

use axon::{ErrorKind, RunStatus};

fn error_kind(status: &RunStatus) -> Option<ErrorKind> {
    match status {
        RunStatus::RuntimeError { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[test]
fn nearest_override_wins_across_three_levels() {
    let outcome = axon::run(indoc! {"
        class A:
            function who():
                return \"a\"
            function describe():
                return \"I am \" + self.who()

        class B extends A:
            function who():
                return \"b\"

        class C extends B:
            pass

        print(new A().describe())
        print(new B().describe())
        print(new C().describe())
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["I am a", "I am b", "I am b"]);
}

#[test]
fn inherited_init_sets_fields() {
    let outcome = axon::run(indoc! {"
        class Point:
            function init(x, y):
                self.x = x
                self.y = y
            function sum():
                return self.x + self.y

        class Labelled extends Point:
            function label():
                return \"p\" + str(self.sum())

        p = Labelled(2, 5)
        print(p.label(), p.x)
    "});

    assert_eq!(outcome.output, vec!["p7 2"]);
}

#[test]
fn missing_attribute_names_the_class() {
    let outcome = axon::run(indoc! {"
        class C:
            pass

        c = C()
        print(c.x)
    "});

    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::AttributeError));
    assert!(
        outcome
            .status
            .to_string()
            .contains("Unknown attribute 'x' for type C")
    );
}

#[test]
fn init_arity_is_checked() {
    let outcome = axon::run(indoc! {"
        class P:
            function init(a):
                self.a = a

        p = P()
    "});

    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::TypeError));
    assert!(
        outcome
            .status
            .to_string()
            .contains("expected 1 arguments, got 0")
    );

    let no_init = axon::run("class Q:\n    pass\nq = Q(1)\n");
    assert_eq!(error_kind(&no_init.status), Some(ErrorKind::TypeError));
}

#[test]
fn instances_are_shared_by_reference() {
    let outcome = axon::run(indoc! {"
        class Counter:
            function init():
                self.count = 0
            function bump():
                self.count = self.count + 1

        c = Counter()
        d = c
        c.bump()
        d.bump()
        print(c.count)
    "});

    assert_eq!(outcome.output, vec!["2"]);
}

#[test]
fn extending_a_non_class_fails() {
    let outcome = axon::run(indoc! {"
        Base = 3
        class Child extends Base:
            pass
    "});

    assert_eq!(error_kind(&outcome.status), Some(ErrorKind::TypeError));
}

#[test]
fn methods_run_inside_threads() {
    let outcome = axon::run(indoc! {"
        class Worker:
            function init(name):
                self.name = name
            function run():
                yield
                print(self.name + \" done\")

        w = Worker(\"w1\")
        thread start w.run() as t
        join t
        print(status(t))
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["w1 done", "completed"]);
    assert!(outcome.context("Worker.run").is_some());
}
