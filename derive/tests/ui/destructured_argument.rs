#[ctxmock::mockable]
trait PairConsumer {
    fn consume(&self, (a, b): (i32, i32)) -> i32;
}

fn main() {}
