/// In this file, we parse textual `spec` representations of Petri nets.
///
/// The format is described [here](https://github.com/pierreganty/mist/wiki#input-format-of-mist).
/// An example Petri net spec is as follows:
/// /// ```
/// /// vars
/// ///     p1 p2 p3
/// /// rules
/// ///     p1 >= 1 ->
/// ///         p1' = p1-1,
/// ///         p2' = p2+1;
/// ///     p2 >= 1 ->
/// ///         p2' = p2-1,
/// ///         p3' = p3+1;
/// /// init
/// ///     p1=2, p2=0, p3=0
/// /// target
/// ///     p1=0, p2=0, p3=2
/// /// rates
/// ///     t1 = 0.5;
/// ///     t2 = 0.1 * p1;
/// /// ```
///
/// Variables become places with the same name. Rules become transitions named
/// `t1`, `t2`, ... in the order they are listed. The optional `rates` section
/// assigns a rate expression to a transition, the default rate is `1`.
///
/// Only updates that modify the counter itself are supported (no transfer of
/// tokens between places). Init and target only support equality constraints.
/// Unnamed places are assumed to have value 0 in init and target.
use nom::{
    Parser,
    bytes::complete::{tag, take_until},
    character::complete::space1,
    error::ParseError,
};

use crate::{
    marking::Marking,
    net::{
        PetriNetQuery, PlaceIndex, initialized::InitializedPetriNet,
        transition::PetriNetTransition,
    },
};

fn integer<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, u64, E> {
    let (rest, num_str) = nom::character::complete::digit1(input)?;
    match num_str.parse::<u64>() {
        Ok(num) => Ok((rest, num)),
        Err(_) => Err(nom::Err::Error(E::from_error_kind(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn opt_whitespace<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    nom::character::complete::multispace0(input)
}

fn whitespace<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    nom::character::complete::multispace1(input)
}

fn separator<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, (), E> {
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag(",")(input)?;
    let (input, _) = opt_whitespace(input)?;
    Ok((input, ()))
}

fn variable<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, &'a str, E> {
    let (input2, (first, rest)) = (
        nom::character::complete::alpha1,
        nom::character::complete::alphanumeric0,
    )
        .parse(input)?;

    Ok((input2, &input[..first.len() + rest.len()]))
}

// E.g., x1 x2 x3
fn set_of_vars<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, Vec<&'a str>, E> {
    nom::multi::separated_list1(space1, variable).parse(input)
}

#[derive(Debug, Clone)]
pub struct GuardAtom<'a> {
    pub var: &'a str,
    pub value: u64,
}

fn guard_atom<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, GuardAtom<'a>, E> {
    let (input, var) = variable(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag(">=")(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, value) = integer(input)?;

    Ok((input, GuardAtom { var, value }))
}

#[test]
fn test_guard_atom() {
    let input = "abc12 >= 34";
    let (_, atom) = guard_atom::<nom::error::Error<&str>>(input).unwrap();
    assert_eq!(atom.var, "abc12");
    assert_eq!(atom.value, 34);
}

#[derive(Debug, Clone)]
pub struct Guard<'a> {
    pub atoms: Vec<GuardAtom<'a>>,
}

impl<'a> Guard<'a> {
    pub fn to_marking(&self, variables: &[&'a str]) -> anyhow::Result<Marking> {
        let mut marking = Marking::zero(variables.len());

        for atom in &self.atoms {
            let Some(pos) = variables.iter().position(|&v| v == atom.var) else {
                anyhow::bail!("Variable '{}' not found in variable list.", atom.var);
            };
            marking[PlaceIndex::new(pos as u32)] = atom.value;
        }

        Ok(marking)
    }
}

fn guard<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Guard<'a>, E> {
    let (input, atoms) = nom::multi::separated_list1(separator, guard_atom).parse(input)?;

    Ok((input, Guard { atoms }))
}

#[derive(Debug, Clone)]
pub struct Update<'a> {
    pub target: &'a str,
    pub source: &'a str,
    pub change: i64,
}

fn update<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Update<'a>, E> {
    let (input, target) = variable(input)?;
    let (input, _) = tag("'")(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, source) = variable(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, sign) = nom::branch::alt((tag("+"), tag("-"))).parse(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, value) = integer(input)?;

    let change = if sign == "+" {
        value as i64
    } else {
        -(value as i64)
    };

    Ok((
        input,
        Update {
            target,
            source,
            change,
        },
    ))
}

#[test]
fn test_update() {
    let input = "p3' = a1-5";
    let (_, update) = update::<nom::error::Error<&str>>(input).unwrap();
    assert_eq!(update.target, "p3");
    assert_eq!(update.source, "a1");
    assert_eq!(update.change, -5);
}

#[derive(Debug, Clone)]
pub struct TransitionSpec<'a> {
    pub guard: Guard<'a>,
    pub updates: Vec<Update<'a>>,
}

impl<'a> TransitionSpec<'a> {
    /// The guard gives the tokens a transition needs, the updates its net
    /// effect. A guard that is larger than the consumed amount becomes a
    /// read arc pair (consume and produce again).
    pub fn to_transition(
        &self,
        name: String,
        variables: &[&'a str],
    ) -> anyhow::Result<PetriNetTransition> {
        let mut input = vec![0u64; variables.len()];
        let mut change = vec![0i64; variables.len()];

        for atom in &self.guard.atoms {
            let Some(pos) = variables.iter().position(|&v| v == atom.var) else {
                anyhow::bail!("Variable '{}' in guard not found in variable list.", atom.var);
            };
            input[pos] = atom.value;
        }

        for update in &self.updates {
            if update.source != update.target {
                anyhow::bail!(
                    "Unsupported update from '{}' to '{}'. Only changes to the counter itself are supported.",
                    update.source,
                    update.target
                );
            }

            let Some(pos) = variables.iter().position(|&v| v == update.source) else {
                anyhow::bail!(
                    "Variable '{}' in update not found in variable list.",
                    update.source
                );
            };

            if update.change < 0 && (-update.change) as u64 > input[pos] {
                anyhow::bail!(
                    "Cannot consume {} tokens from variable '{}' which has only {} tokens in the guard.",
                    -update.change,
                    update.source,
                    input[pos]
                );
            }
            change[pos] += update.change;
        }

        let output = input
            .iter()
            .zip(change.iter())
            .map(|(&i, &c)| (i as i64 + c) as u64)
            .collect::<Vec<_>>();

        Ok(PetriNetTransition::from_updates(name, &input, &output))
    }
}

fn transition<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, TransitionSpec<'a>, E> {
    let (input, guard) = guard(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag("->")(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, updates) = nom::multi::separated_list1(separator, update).parse(input)?;
    let (input, _) = tag(";")(input)?;

    Ok((input, TransitionSpec { guard, updates }))
}

#[test]
fn test_transition() {
    let input = r#"p1 >= 1, p2 >= 0 ->
        p1' = p1 - 1,
        p2' = p2 + 1;"#;

    let (_, transition) = transition::<nom::error::Error<&str>>(input).unwrap();
    assert_eq!(transition.guard.atoms.len(), 2);
    assert_eq!(transition.updates.len(), 2);
}

fn eq_guard_atom<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, GuardAtom<'a>, E> {
    let (input, var) = variable(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, value) = integer(input)?;

    Ok((input, GuardAtom { var, value }))
}

fn eq_guard<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Guard<'a>, E> {
    let (input, atoms) = nom::multi::separated_list1(separator, eq_guard_atom).parse(input)?;

    Ok((input, Guard { atoms }))
}

fn section<'a, E: ParseError<&'a str>>(
    name: &'static str,
) -> impl Parser<&'a str, Output = (), Error = E> {
    move |input: &'a str| {
        let (input, _) = opt_whitespace(input)?;
        let (input, _) = tag(name)(input)?;
        let (input, _) = whitespace(input)?;
        Ok((input, ()))
    }
}

fn vars<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Vec<&'a str>, E> {
    let (input, _) = section("vars").parse(input)?;
    set_of_vars(input)
}

fn rules<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> nom::IResult<&'a str, Vec<TransitionSpec<'a>>, E> {
    let (input, _) = section("rules").parse(input)?;
    nom::multi::separated_list1(opt_whitespace, transition).parse(input)
}

fn init<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Guard<'a>, E> {
    let (input, _) = section("init").parse(input)?;
    eq_guard(input)
}

fn target<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Guard<'a>, E> {
    let (input, _) = section("target").parse(input)?;
    eq_guard(input)
}

#[derive(Debug, Clone)]
pub struct RateSpec<'a> {
    pub transition: &'a str,
    pub expression: &'a str,
}

fn rate<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, RateSpec<'a>, E> {
    let (input, transition) = variable(input)?;
    let (input, _) = opt_whitespace(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, expression) = take_until(";")(input)?;
    let (input, _) = tag(";")(input)?;

    Ok((
        input,
        RateSpec {
            transition,
            expression,
        },
    ))
}

fn rates<'a, E: ParseError<&'a str>>(input: &'a str) -> nom::IResult<&'a str, Vec<RateSpec<'a>>, E> {
    let (input, _) = section("rates").parse(input)?;
    nom::multi::separated_list1(opt_whitespace, rate).parse(input)
}

#[test]
fn test_rates() {
    let input = r#"
    rates
        t1 = 0.5;
        t2 = 0.1 * p1;
    "#;

    let (_, rates) = rates::<nom::error::Error<&str>>(input).unwrap();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].transition, "t1");
    assert_eq!(rates[1].expression.trim(), "0.1 * p1");
}

#[derive(Debug, Clone)]
pub struct PetriNetSpec<'a> {
    pub variables: Vec<&'a str>,
    pub rules: Vec<TransitionSpec<'a>>,
    pub initial: Guard<'a>,
    pub target: Guard<'a>,
    pub rates: Vec<RateSpec<'a>>,
}

impl<'a> PetriNetSpec<'a> {
    fn p(input: &'a str) -> nom::IResult<&'a str, PetriNetSpec<'a>, nom::error::Error<&'a str>> {
        let (input, variables) = vars(input)?;
        let (input, rules) = rules(input)?;
        let (input, initial) = init(input)?;
        let (input, target) = target(input)?;
        let (input, rates) = nom::combinator::opt(rates).parse(input)?;
        let (input, _) = opt_whitespace(input)?;

        Ok((
            input,
            PetriNetSpec {
                variables,
                rules,
                initial,
                target,
                rates: rates.unwrap_or_default(),
            },
        ))
    }

    pub fn parse(input: &'a str) -> anyhow::Result<PetriNetSpec<'a>> {
        match Self::p(input) {
            Ok((rest, spec)) if rest.is_empty() => Ok(spec),
            Ok((rest, _)) => Err(anyhow::anyhow!(
                "Failed to parse Petri net spec, unexpected trailing input: {}",
                rest.lines().next().unwrap_or_default()
            )),
            Err(e) => Err(anyhow::anyhow!("Failed to parse Petri net spec: {}", e)),
        }
    }
}

#[test]
fn test_spec() {
    let spec_str = r#"
    vars
        p1 p2 p3
    rules
        p1 >= 1 ->
            p1' = p1-1,
            p2' = p2+1;
        p2 >= 1 ->
            p2' = p2-1,
            p3' = p3+1;
    init
        p1=2, p2=0, p3=0
    target
        p1=0, p2=0, p3=2"#;
    let (_, spec) = PetriNetSpec::p(spec_str).unwrap();
    assert_eq!(spec.variables, vec!["p1", "p2", "p3"]);
    assert_eq!(spec.rules.len(), 2);
    assert_eq!(spec.initial.atoms.len(), 3);
    assert_eq!(spec.target.atoms.len(), 3);
    assert!(spec.rates.is_empty());
}

pub trait ToSpecFormat {
    fn to_spec_format(&self) -> String;
}

impl ToSpecFormat for InitializedPetriNet {
    fn to_spec_format(&self) -> String {
        let net = &self.net;
        let mut spec = String::new();

        // vars
        spec.push_str("vars\n    ");
        let vars = net
            .places()
            .map(|p| net.place_name(p).to_string())
            .collect::<Vec<String>>()
            .join(" ");
        spec.push_str(&vars);
        spec.push('\n');

        // rules
        spec.push_str("rules\n");
        for t in net.transitions() {
            let transition = net.transition(t);
            spec.push_str("    ");

            let mut guard_atoms = vec![];
            for (weight, place) in transition.input() {
                guard_atoms.push(format!("{} >= {}", net.place_name(*place), weight));
            }
            if guard_atoms.is_empty() {
                guard_atoms.push(format!(
                    "{} >= 0",
                    net.place_name(PlaceIndex::new(0))
                ));
            }
            spec.push_str(&guard_atoms.join(", "));
            spec.push_str(" ->\n        ");

            let mut updates = vec![];
            for place in net.places() {
                let change = transition.net_change(place);
                if change != 0 {
                    let name = net.place_name(place);
                    let sign = if change > 0 { "+" } else { "-" };
                    updates.push(format!("{}' = {}{}{}", name, name, sign, change.abs()));
                }
            }
            if updates.is_empty() {
                let name = net.place_name(PlaceIndex::new(0));
                updates.push(format!("{}' = {}+0", name, name));
            }
            spec.push_str(&updates.join(",\n        "));
            spec.push_str(";\n");
        }

        let marking_atoms = |marking: &Marking| {
            net.places()
                .map(|p| format!("{}={}", net.place_name(p), marking[p]))
                .collect::<Vec<_>>()
                .join(", ")
        };

        spec.push_str("init\n    ");
        spec.push_str(&marking_atoms(&self.initial_marking));
        spec.push('\n');

        spec.push_str("target\n    ");
        spec.push_str(&marking_atoms(&self.target_marking));
        spec.push('\n');

        let rates = net
            .transitions()
            .filter(|t| net.transition(*t).rate() != "1")
            .map(|t| format!("    {} = {};", net.transition_name(t), net.transition(t).rate()))
            .collect::<Vec<_>>();
        if !rates.is_empty() {
            spec.push_str("rates\n");
            spec.push_str(&rates.join("\n"));
            spec.push('\n');
        }

        spec
    }
}
