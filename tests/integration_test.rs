use std::{cell::RefCell, io::Cursor, rc::Rc};

use brasiliana::interpreter::{Interpreter, RuntimeError};

fn run_with_input(source: &str, input: &str) -> (Result<(), brasiliana::Error>, String) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(
        output.clone(),
        Rc::new(RefCell::new(Cursor::new(input.as_bytes().to_vec()))),
    );
    let result = brasiliana::run(source, &mut interpreter);
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (result, output) = run_with_input(source, "");
    result.expect("Interpret should work on valid program");
    assert_eq!(output, expected_output);
}

#[test]
fn test_print_variable() {
    test_valid_program("declarar variavel x = 1; imprimir(x);", "1\n");
}

#[test]
fn test_function_call() {
    test_valid_program(
        "declarar funcao soma(a,b) { retorne a + b; } imprimir(soma(2,3));",
        "5\n",
    );
}

#[test]
fn test_repeat_to() {
    test_valid_program(
        "declarar variavel i = 0; repita de i ate 3 { imprimir(i); i = i + 1; }",
        "0\n1\n2\n",
    );
}

#[test]
fn test_list_length() {
    test_valid_program(
        "declarar variavel l = [1,2,3]; imprimir(l.tamanho);",
        "3\n",
    );
}

#[test]
fn test_number_text_concatenation() {
    test_valid_program("imprimir(1 + '2');", "12\n");
}

#[test]
fn test_undeclared_function_is_name_error() {
    let (result, output) = run_with_input("imprimir('antes'); naoDeclarada(1 + 'x', 2);", "");
    assert_eq!(output, "antes\n");
    match result {
        Err(brasiliana::Error::Runtime(RuntimeError::UndeclaredVariable(name))) => {
            assert_eq!(name, "naoDeclarada")
        }
        other => panic!("expected a name error, got {other:?}"),
    }
}

#[test]
fn test_fib() {
    let source = r#"
    declarar funcao fib(n) {
        se (n <= 1) { retorne n; }
        retorne fib(n - 1) + fib(n - 2);
    }

    declarar i = 0
    repita de i ate 10 {
        imprimir(fib(i))
        i = i + 1
    }
    "#;
    let expected_output = "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n";
    test_valid_program(source, expected_output);
}

#[test]
fn test_closure() {
    let source = r#"
    declarar funcao criarContador() {
        declarar variavel i = 0;
        declarar funcao contar() {
            i = i + 1;
            retorne i;
        }
        retorne contar;
    }

    declarar contador = criarContador();
    imprimir(contador()); // 1
    imprimir(contador()); // 2
    "#;
    test_valid_program(source, "1\n2\n");
}

#[test]
fn test_closure_sees_later_assignment() {
    let source = r#"
    declarar variavel x = 1;
    declarar funcao lerX() { retorne x; }
    x = 2;
    imprimir(lerX());
    "#;
    test_valid_program(source, "2\n");
}

#[test]
fn test_closure_shares_enclosing_block() {
    let source = r#"
    declarar a = 'global';
    {
        declarar funcao mostrarA() {
            imprimir(a);
        }
        mostrarA();
        declarar a = 'bloco';
        mostrarA();
    }
    "#;
    test_valid_program(source, "global\nbloco\n");
}

#[test]
fn test_return_crosses_only_its_own_call() {
    let source = r#"
    declarar funcao interna() {
        repita de k ate 1 { retorne 'interna'; }
    }
    declarar funcao externa() {
        declarar r = interna();
        imprimir('depois de ' + r);
        retorne 'externa';
    }
    declarar k = 0;
    imprimir(externa());
    "#;
    test_valid_program(source, "depois de interna\nexterna\n");
}

#[test]
fn test_while_and_else() {
    let source = r#"
    declarar n = 0;
    enquanto (n < 4) {
        se (n == 2) { imprimir('dois'); } senao { imprimir(n); }
        n = n + 1;
    }
    "#;
    test_valid_program(source, "0\n1\ndois\n3\n");
}

#[test]
fn test_objects_and_lists() {
    let source = r#"
    declarar pessoa = { nome: 'Ana', idade: 30, tags: [] };
    pessoa.tags[0] = 'a';
    pessoa.idade = pessoa.idade + 1;
    declarar copia = pessoa;
    copia.nome = 'Bia';
    imprimir(pessoa);
    imprimir(pessoa == { idade: 31, nome: 'Bia', tags: ['a'] });
    "#;
    test_valid_program(
        source,
        "{ nome: Bia, idade: 31, tags: [ a ] }\nVerdadeiro\n",
    );
}

#[test]
fn test_chained_postfix() {
    let source = r#"
    declarar funcao dobro(x) { retorne { valor: x * 2 }; }
    declarar o = { fs: [dobro] };
    imprimir(o.fs[0](21).valor);
    "#;
    test_valid_program(source, "42\n");
}

#[test]
fn test_print_formats() {
    test_valid_program(
        "declarar u; imprimir(u, Verdadeiro, Falso, 2.5, 'txt', imprimir); imprimir();",
        "indefinido Verdadeiro Falso 2.5 txt <nativo:imprimir>\n\n",
    );
}

#[test]
fn test_read_input() {
    let source = r#"
    declarar nome = lerEntrada('Nome: ');
    declarar idade = lerEntrada('Idade: ');
    imprimir('Olá, ' + nome + '! Ano que vem: ' + (idade + 1));
    "#;
    let (result, output) = run_with_input(source, "Maria\n41\n");
    result.expect("Interpret should work on valid program");
    assert_eq!(output, "Nome: Idade: Olá, Maria! Ano que vem: 42\n");
}

#[test]
fn test_syntax_error_reports_position() {
    let (result, output) = run_with_input("imprimir(1);\ndeclarar funcao (a) {}", "");
    assert_eq!(output, "");
    let err = match result {
        Err(brasiliana::Error::Syntax(err)) => err,
        other => panic!("expected a syntax error, got {other:?}"),
    };
    let position = err.position().expect("error should carry a position");
    assert_eq!((position.line, position.column), (2, 17));
}

#[test]
fn test_lexical_error() {
    let (result, _) = run_with_input("declarar x = 1 # 2", "");
    assert!(matches!(result, Err(brasiliana::Error::Tokenize(_))));
}

#[test]
fn test_runtime_error_is_fatal() {
    let (result, output) = run_with_input("imprimir(1); imprimir(1 - 'a'); imprimir(2);", "");
    assert_eq!(output, "1\n");
    assert!(matches!(
        result,
        Err(brasiliana::Error::Runtime(RuntimeError::RequiresNumbers { .. }))
    ));
}
