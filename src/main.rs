/*

Notes:
    Large-Small pairs are only ever found from the Large side. Widening the
    Small search window means revisiting `should_resolve` first.

    Forces are accumulated with CAS loops on the float bit pattern. A gather
    formulation (every particle sums its own contributions) would avoid the
    atomics at the cost of evaluating every contact twice.

TODO:
    Per-particle Large search width (currently the widest Large radius sets the
    window for every Large particle).
*/

mod platform;

fn main() {
    platform::start();
}
