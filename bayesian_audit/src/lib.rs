/*!
This crate runs Bayesian ballot-polling audits of elections.

An audit draws ballots from the cast population in small batches. After each
batch, the sample is completed many times into a full synthetic population
using Polya's urn, seeded with the observed ballots and one prior ballot per
candidate. The social choice function is evaluated on every completion.
When one outcome wins in at least `trials * (1 - alpha)` of the completions,
the audit stops and confirms it. If every ballot gets drawn first, the audit
is exhausted and the election needs a full hand count.

```
use bayesian_audit::*;
use bayesian_audit::election::SimulatedElection;
use rand::rngs::StdRng;
use rand::SeedableRng;

let mut election = SimulatedElection::new(3, 1000, 1.0, StdRng::seed_from_u64(1));
let mut rng = StdRng::seed_from_u64(2);
let result = audit::audit(&mut election, &AuditParams::default(), &mut rng)?;
assert!(result.samples_examined <= 1000);
# Ok::<(), AuditErrors>(())
```

See the `builder` module to audit real ballots.
*/

mod config;

pub mod audit;
pub mod builder;
pub mod election;
pub mod scf;
pub mod tiebreak;
pub mod urn;

pub use crate::config::*;
