#[ctxmock::mockable]
trait Counter {
    fn increment(&mut self) -> i32;
}

fn main() {}
